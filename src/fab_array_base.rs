use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use log::debug;
use crate::box_array::BoxArray;
use crate::distribution_mapping::DistributionMapping;
use crate::error::{Error, Result};
use crate::index_box::IndexBox;
use crate::int_vect::IntVect;
use crate::message::Communicator;




/**
 * One unit of work of an `MFIter`: a cell-centered tile of the valid region
 * of a locally owned box.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileEntry<const DIM: usize> {
    /// Position of the owning box in the local index list.
    pub local_index: usize,
    /// Position of the owning box in the box array.
    pub global_index: usize,
    /// The tile, in cell-centered coordinates.
    pub tile: IndexBox<DIM>,
}




/**
 * The tile decomposition of every local box for one tile size. Entries are
 * ordered by local index, then by the row-major order of the tiles within
 * the box.
 */
pub type TileArray<const DIM: usize> = Vec<TileEntry<DIM>>;




/**
 * The immutable layout of a defined fab array: its decomposition, ownership,
 * component count and ghost width, plus everything derived from them. A
 * layout is shared (by `Arc`) between the fab array and every iterator built
 * over it; redefining the array installs a new layout rather than touching
 * this one.
 */
pub struct Layout<const DIM: usize> {
    box_array: BoxArray<DIM>,
    distribution_map: DistributionMapping,
    ncomp: usize,
    ngrow: IntVect<DIM>,
    rank: usize,
    local_indices: Vec<usize>,
    local_of_global: Vec<Option<usize>>,
    comm: Arc<dyn Communicator>,
    tiles: Mutex<HashMap<Option<IntVect<DIM>>, Arc<TileArray<DIM>>>>,
}




// ============================================================================
impl<const DIM: usize> Layout<DIM> {

    pub fn box_array(&self) -> &BoxArray<DIM> {
        &self.box_array
    }

    pub fn distribution_map(&self) -> &DistributionMapping {
        &self.distribution_map
    }

    pub fn ncomp(&self) -> usize {
        self.ncomp
    }

    pub fn ngrow(&self) -> IntVect<DIM> {
        self.ngrow
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn local_indices(&self) -> &[usize] {
        &self.local_indices
    }

    pub fn communicator(&self) -> &Arc<dyn Communicator> {
        &self.comm
    }

    /**
     * Return the position in the local index list of the given global box
     * index, or `None` if the box is owned by another rank.
     */
    pub fn local_index_of(&self, i: usize) -> Result<Option<usize>> {
        self.local_of_global
            .get(i)
            .copied()
            .ok_or_else(|| Error::out_of_range("box", i, self.box_array.len()))
    }

    pub fn box_at(&self, i: usize) -> Result<IndexBox<DIM>> {
        self.box_array.get(i)
    }

    pub fn grown_box(&self, i: usize, extra: IntVect<DIM>) -> Result<IndexBox<DIM>> {
        Ok(self.box_at(i)?.grow(self.ngrow + extra))
    }

    pub fn fab_box(&self, i: usize) -> Result<IndexBox<DIM>> {
        self.grown_box(i, IntVect::zero())
    }

    /**
     * Whether two layouts describe the same decomposition: structurally
     * equal box arrays and distribution mappings. Component count and ghost
     * width may differ.
     */
    pub fn is_compatible(&self, other: &Self) -> bool {
        (self.box_array.is_same(&other.box_array) || self.box_array == other.box_array)
            && (self.distribution_map.is_same(&other.distribution_map) || self.distribution_map == other.distribution_map)
    }

    /**
     * Return the tile decomposition for the given tile size (`None` meaning
     * one tile per box), computing and caching it on first use.
     */
    pub fn tile_array(&self, tile_size: Option<IntVect<DIM>>) -> Result<Arc<TileArray<DIM>>> {
        if let Some(ts) = tile_size {
            if (0..DIM).any(|d| ts[d] <= 0) {
                return Err(Error::invalid(format!("tile size {} must be positive", ts)))
            }
        }
        let mut cache = self.tiles.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(tiles) = cache.get(&tile_size) {
            return Ok(tiles.clone())
        }
        let mut tiles = Vec::new();

        for (local_index, &global_index) in self.local_indices.iter().enumerate() {
            let cells = self.box_at(global_index)?.enclosed_cells();
            let pieces = match tile_size {
                Some(ts) => cells.tiles(ts),
                None => vec![cells],
            };
            tiles.extend(pieces.into_iter().map(|tile| TileEntry { local_index, global_index, tile }))
        }
        let tiles = Arc::new(tiles);
        cache.insert(tile_size, tiles.clone());
        Ok(tiles)
    }
}




/**
 * The metadata layer of a fab array: binds a box array, a distribution
 * mapping and a ghost width, and answers which boxes live on this rank. All
 * queries fail with `NotDefined` until `define` has been called.
 */
#[derive(Clone, Default)]
pub struct FabArrayBase<const DIM: usize> {
    layout: Option<Arc<Layout<DIM>>>,
}




// ============================================================================
impl<const DIM: usize> FabArrayBase<DIM> {




    pub fn new() -> Self {
        Self { layout: None }
    }


    /**
     * Bind this base to a decomposition. Every rank in the distribution
     * mapping must be a member of the communicator's group. Any previous
     * layout (and the tile caches hanging off it) is dropped.
     */
    pub fn define(
        &mut self,
        box_array: BoxArray<DIM>,
        distribution_map: DistributionMapping,
        ncomp: usize,
        ngrow: IntVect<DIM>,
        comm: Arc<dyn Communicator>) -> Result<()>
    {
        if ncomp == 0 {
            return Err(Error::invalid("number of components must be positive"))
        }
        if !ngrow.is_non_negative() {
            return Err(Error::invalid(format!("ghost width {} has a negative component", ngrow)))
        }
        if distribution_map.len() != box_array.len() {
            return Err(Error::invalid(format!(
                "distribution mapping has {} entries for {} boxes",
                distribution_map.len(),
                box_array.len())))
        }
        let rank = comm.rank();
        let size = comm.size();

        if rank >= size {
            return Err(Error::out_of_range("rank", rank, size))
        }
        if let Some(&r) = distribution_map.ranks().iter().find(|&&r| r >= size) {
            return Err(Error::out_of_range("rank", r, size))
        }

        let local_indices = distribution_map.indices_on(rank);
        let mut local_of_global = vec![None; box_array.len()];

        for (k, &i) in local_indices.iter().enumerate() {
            local_of_global[i] = Some(k)
        }

        debug!("[{}] define: {} boxes ({} local), {} components, ghost {}",
            rank,
            box_array.len(),
            local_indices.len(),
            ncomp,
            ngrow);

        self.layout = Some(Arc::new(Layout {
            box_array,
            distribution_map,
            ncomp,
            ngrow,
            rank,
            local_indices,
            local_of_global,
            comm,
            tiles: Mutex::new(HashMap::new()),
        }));
        Ok(())
    }


    /**
     * Release the layout; the base goes back to the undefined state.
     */
    pub fn clear(&mut self) {
        self.layout = None
    }


    pub fn is_defined(&self) -> bool {
        self.layout.is_some()
    }


    pub fn layout(&self) -> Result<&Arc<Layout<DIM>>> {
        self.layout.as_ref().ok_or(Error::NotDefined)
    }




    pub fn box_array(&self) -> Result<&BoxArray<DIM>> {
        Ok(self.layout()?.box_array())
    }


    pub fn distribution_map(&self) -> Result<&DistributionMapping> {
        Ok(self.layout()?.distribution_map())
    }


    pub fn communicator(&self) -> Result<&Arc<dyn Communicator>> {
        Ok(self.layout()?.communicator())
    }


    /**
     * The global indices of the boxes owned by this rank, ascending.
     */
    pub fn local_indices(&self) -> Result<&[usize]> {
        Ok(self.layout()?.local_indices())
    }


    pub fn local_index_of(&self, i: usize) -> Result<Option<usize>> {
        self.layout()?.local_index_of(i)
    }


    pub fn box_at(&self, i: usize) -> Result<IndexBox<DIM>> {
        self.layout()?.box_at(i)
    }


    /**
     * Box `i` grown by the ghost width plus `extra`.
     */
    pub fn grown_box(&self, i: usize, extra: IntVect<DIM>) -> Result<IndexBox<DIM>> {
        self.layout()?.grown_box(i, extra)
    }


    /**
     * The box covered by the storage of fab `i`: its valid box grown by the
     * ghost width.
     */
    pub fn fab_box(&self, i: usize) -> Result<IndexBox<DIM>> {
        self.layout()?.fab_box(i)
    }


    pub fn is_cell_centered(&self) -> Result<bool> {
        Ok(self.layout()?.box_array().ix_type().is_cell_centered())
    }


    pub fn is_all_cell_centered(&self) -> Result<bool> {
        self.is_cell_centered()
    }


    /**
     * Whether the data is nodal along every axis.
     */
    pub fn is_nodal(&self) -> Result<bool> {
        Ok(self.layout()?.box_array().ix_type().is_all_nodal())
    }


    pub fn is_all_nodal(&self) -> Result<bool> {
        self.is_nodal()
    }


    pub fn is_nodal_dir(&self, axis: usize) -> Result<bool> {
        if axis >= DIM {
            return Err(Error::out_of_range("axis", axis, DIM))
        }
        Ok(self.layout()?.box_array().ix_type().is_nodal(axis))
    }


    pub fn n_comp(&self) -> Result<usize> {
        Ok(self.layout()?.ncomp())
    }


    pub fn n_grow_vect(&self) -> Result<IntVect<DIM>> {
        Ok(self.layout()?.ngrow())
    }


    /**
     * The number of boxes in the whole array, across all ranks.
     */
    pub fn size(&self) -> Result<usize> {
        Ok(self.layout()?.box_array().len())
    }


    pub fn local_size(&self) -> Result<usize> {
        Ok(self.layout()?.local_indices().len())
    }


    pub fn tile_array(&self, tile_size: Option<IntVect<DIM>>) -> Result<Arc<TileArray<DIM>>> {
        self.layout()?.tile_array(tile_size)
    }


    /**
     * Fail with `IncompatibleLayout` unless both bases are defined over
     * structurally equal box arrays and distribution mappings.
     */
    pub fn check_compatible(&self, other: &Self) -> Result<()> {
        if self.layout()?.is_compatible(other.layout()?) {
            Ok(())
        } else {
            Err(Error::IncompatibleLayout)
        }
    }
}

impl<const DIM: usize> AsRef<FabArrayBase<DIM>> for FabArrayBase<DIM> {
    fn as_ref(&self) -> &FabArrayBase<DIM> {
        self
    }
}
