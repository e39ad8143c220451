use std::sync::Arc;
use crate::error::{Error, Result};
use crate::fab_array_base::{FabArrayBase, Layout, TileArray, TileEntry};
use crate::index_box::IndexBox;
use crate::int_vect::{IndexType, IntVect};




/**
 * The tile size used when tiling is switched on without a size: long runs
 * along the first (slowest-varying) axis are avoided by cutting the
 * remaining axes into slabs of 8.
 */
pub fn default_tile_size<const DIM: usize>() -> IntVect<DIM> {
    let mut ts = IntVect::splat(8);
    ts[0] = 1024000;
    ts
}




/**
 * Tiling configuration for an `MFIter`.
 */
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MFItInfo<const DIM: usize> {
    pub do_tiling: bool,
    pub tile_size: IntVect<DIM>,
}

impl<const DIM: usize> Default for MFItInfo<DIM> {
    fn default() -> Self {
        Self { do_tiling: false, tile_size: default_tile_size() }
    }
}

impl<const DIM: usize> MFItInfo<DIM> {

    /**
     * Tile with the given size.
     */
    pub fn tiled(tile_size: IntVect<DIM>) -> Self {
        Self { do_tiling: true, tile_size }
    }

    pub fn enable_tiling(mut self, do_tiling: bool) -> Self {
        self.do_tiling = do_tiling;
        self
    }

    pub fn set_tile_size(mut self, tile_size: IntVect<DIM>) -> Self {
        self.tile_size = tile_size;
        self
    }
}




#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Cursor {
    Positioned(usize),
    Exhausted,
}




/**
 * A snapshot of one position of an `MFIter`, yielded by its `Iterator`
 * implementation.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileInfo<const DIM: usize> {
    pub index: usize,
    pub local_index: usize,
    pub tile_index: usize,
    pub valid_box: IndexBox<DIM>,
    pub tilebox: IndexBox<DIM>,
    pub fab_box: IndexBox<DIM>,
}




/**
 * A cursor over the tiles of the boxes owned by this rank. Boxes are visited
 * in ascending global index, and the tiles of a box in row-major order, so
 * two iterators over the same layout and tiling visit identical sequences.
 *
 * The iterator keeps its own handle on the layout, not a borrow of the fab
 * array, so the array may be mutated (through `FabArray::array`) while the
 * iterator is alive. It starts positioned on the first tile, or exhausted if
 * this rank owns no boxes.
 *
 * The geometry queries all fail with `InvalidState` once the iterator is
 * exhausted. `advance` past the end returns `IteratorExhausted`, which is
 * the normal end-of-sequence signal. The `Iterator` implementation wraps
 * the same cursor: each call to `next` yields the current position and then
 * advances.
 */
pub struct MFIter<const DIM: usize> {
    layout: Arc<Layout<DIM>>,
    tiles: Arc<TileArray<DIM>>,
    info: MFItInfo<DIM>,
    cursor: Cursor,
}




// ============================================================================
impl<const DIM: usize> MFIter<DIM> {




    /**
     * Iterate over the local boxes of a defined base (or fab array) without
     * tiling.
     */
    pub fn new<B: AsRef<FabArrayBase<DIM>>>(base: &B) -> Result<Self> {
        Self::with_info(base, MFItInfo::default())
    }


    pub fn with_info<B: AsRef<FabArrayBase<DIM>>>(base: &B, info: MFItInfo<DIM>) -> Result<Self> {
        let layout = base.as_ref().layout()?.clone();
        let tiles = layout.tile_array(if info.do_tiling { Some(info.tile_size) } else { None })?;
        let cursor = if tiles.is_empty() { Cursor::Exhausted } else { Cursor::Positioned(0) };
        Ok(Self { layout, tiles, info, cursor })
    }


    /**
     * Convenience for the common case of a tiled iteration with a given
     * tile size.
     */
    pub fn tiled<B: AsRef<FabArrayBase<DIM>>>(base: &B, tile_size: IntVect<DIM>) -> Result<Self> {
        Self::with_info(base, MFItInfo::tiled(tile_size))
    }


    pub(crate) fn layout(&self) -> &Arc<Layout<DIM>> {
        &self.layout
    }


    pub fn info(&self) -> &MFItInfo<DIM> {
        &self.info
    }


    /**
     * Step to the next tile. Returns `IteratorExhausted` if the iterator had
     * already run off the end.
     */
    pub fn advance(&mut self) -> Result<()> {
        match self.cursor {
            Cursor::Positioned(k) if k + 1 < self.tiles.len() => self.cursor = Cursor::Positioned(k + 1),
            Cursor::Positioned(_) => self.cursor = Cursor::Exhausted,
            Cursor::Exhausted => return Err(Error::IteratorExhausted),
        }
        Ok(())
    }


    /**
     * Go back to the first tile.
     */
    pub fn rewind(&mut self) {
        self.cursor = if self.tiles.is_empty() { Cursor::Exhausted } else { Cursor::Positioned(0) };
    }


    pub fn is_valid(&self) -> bool {
        matches!(self.cursor, Cursor::Positioned(_))
    }


    /**
     * The number of tiles this iterator visits in total.
     */
    pub fn length(&self) -> usize {
        self.tiles.len()
    }


    fn entry(&self) -> Result<&TileEntry<DIM>> {
        match self.cursor {
            Cursor::Positioned(k) => Ok(&self.tiles[k]),
            Cursor::Exhausted => Err(Error::InvalidState("iterator is not positioned on a tile")),
        }
    }




    /**
     * Position of the current tile in the full tile sequence.
     */
    pub fn tile_index(&self) -> Result<usize> {
        match self.cursor {
            Cursor::Positioned(k) => Ok(k),
            Cursor::Exhausted => Err(Error::InvalidState("iterator is not positioned on a tile")),
        }
    }


    /**
     * Global index of the current box.
     */
    pub fn index(&self) -> Result<usize> {
        Ok(self.entry()?.global_index)
    }


    /**
     * Position of the current box among this rank's boxes.
     */
    pub fn local_index(&self) -> Result<usize> {
        Ok(self.entry()?.local_index)
    }


    pub fn valid_box(&self) -> Result<IndexBox<DIM>> {
        self.layout.box_at(self.entry()?.global_index)
    }


    pub fn fab_box(&self) -> Result<IndexBox<DIM>> {
        self.layout.fab_box(self.entry()?.global_index)
    }


    /**
     * The current tile, in the index type of the box array.
     */
    pub fn tilebox(&self) -> Result<IndexBox<DIM>> {
        self.tilebox_typed(self.layout.box_array().ix_type())
    }


    /**
     * The current tile converted to the given index type. A tile gains the
     * extra nodal point on an axis only if it touches the high side of its
     * box, so the nodal tiles of a box do not overlap.
     */
    pub fn tilebox_typed(&self, ix_type: IndexType<DIM>) -> Result<IndexBox<DIM>> {
        let entry = self.entry()?;
        let vbx = self.layout.box_at(entry.global_index)?.enclosed_cells().convert(ix_type);
        let mut bx = entry.tile.convert(ix_type);

        for d in 0..DIM {
            if ix_type.is_nodal(d) && bx.hi()[d] != vbx.hi()[d] {
                bx = bx.grow_hi(d, -1)
            }
        }
        Ok(bx)
    }


    /**
     * The typed tile box, grown by `ngrow` on the sides where the tile
     * touches the boundary of its box. Interior tile faces are not grown,
     * so the grown tiles of one box still do not overlap.
     */
    pub fn tilebox_grown(&self, ix_type: IndexType<DIM>, ngrow: IntVect<DIM>) -> Result<IndexBox<DIM>> {
        let entry = self.entry()?;
        let vbx = self.layout.box_at(entry.global_index)?.enclosed_cells().convert(ix_type);
        let mut bx = self.tilebox_typed(ix_type)?;

        for d in 0..DIM {
            if bx.lo()[d] == vbx.lo()[d] {
                bx = bx.grow_lo(d, ngrow[d])
            }
            if bx.hi()[d] == vbx.hi()[d] {
                bx = bx.grow_hi(d, ngrow[d])
            }
        }
        Ok(bx)
    }


    /**
     * The tile box made nodal along `dir`, or along every axis when `dir`
     * is `None`.
     */
    pub fn nodal_tilebox(&self, dir: Option<usize>) -> Result<IndexBox<DIM>> {
        self.tilebox_typed(nodal_type(dir)?)
    }


    /**
     * The tile box grown by `ngrow`, or by the layout's ghost width when
     * `ngrow` is `None`.
     */
    pub fn grown_tilebox(&self, ngrow: Option<IntVect<DIM>>) -> Result<IndexBox<DIM>> {
        let ngrow = ngrow.unwrap_or_else(|| self.layout.ngrow());
        self.tilebox_grown(self.layout.box_array().ix_type(), ngrow)
    }


    pub fn grown_nodal_tilebox(&self, dir: Option<usize>, ngrow: Option<IntVect<DIM>>) -> Result<IndexBox<DIM>> {
        let ngrow = ngrow.unwrap_or_else(|| self.layout.ngrow());
        self.tilebox_grown(nodal_type(dir)?, ngrow)
    }


    fn snapshot(&self) -> Result<TileInfo<DIM>> {
        Ok(TileInfo {
            index: self.index()?,
            local_index: self.local_index()?,
            tile_index: self.tile_index()?,
            valid_box: self.valid_box()?,
            tilebox: self.tilebox()?,
            fab_box: self.fab_box()?,
        })
    }
}

impl<const DIM: usize> Iterator for MFIter<DIM> {
    type Item = TileInfo<DIM>;

    fn next(&mut self) -> Option<Self::Item> {
        let info = self.snapshot().ok()?;
        self.advance().ok()?;
        Some(info)
    }
}

fn nodal_type<const DIM: usize>(dir: Option<usize>) -> Result<IndexType<DIM>> {
    match dir {
        None => Ok(IndexType::node()),
        Some(d) if d < DIM => Ok(IndexType::face(d)),
        Some(d) => Err(Error::out_of_range("axis", d, DIM)),
    }
}
