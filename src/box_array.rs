use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use crate::error::{Error, Result};
use crate::index_box::IndexBox;
use crate::int_vect::{IndexType, IntVect};




static NEXT_BOX_ARRAY_ID: AtomicU64 = AtomicU64::new(1);




struct BoxArrayData<const DIM: usize> {
    id: u64,
    ix_type: IndexType<DIM>,
    boxes: Vec<IndexBox<DIM>>,
}




/**
 * An ordered, immutable collection of boxes describing the decomposition of
 * a domain. A box's position in the sequence is its identity for the
 * lifetime of the array.
 *
 * Box arrays are cheap to clone: clones share the underlying list and its
 * identity. Every derivation (`grow`, `convert`, `coarsen`, `refine`,
 * `max_size`) yields a new array with a fresh identity, so metadata cached
 * against an existing array never needs invalidating. Two ways of comparing
 * are offered: `is_same` compares identity (two independently built arrays
 * with the same boxes are not the same), and `==` compares structure.
 */
#[derive(Clone)]
pub struct BoxArray<const DIM: usize> {
    inner: Arc<BoxArrayData<DIM>>,
}




// ============================================================================
impl<const DIM: usize> BoxArray<DIM> {


    fn from_parts(ix_type: IndexType<DIM>, boxes: Vec<IndexBox<DIM>>) -> Self {
        let id = NEXT_BOX_ARRAY_ID.fetch_add(1, Ordering::Relaxed);
        Self { inner: Arc::new(BoxArrayData { id, ix_type, boxes }) }
    }


    /**
     * A box array consisting of a single box covering the domain. Usually
     * followed by `max_size` to decompose it.
     */
    pub fn from_domain(domain: IndexBox<DIM>) -> Self {
        Self::from_parts(domain.ix_type(), vec![domain])
    }


    /**
     * Build a box array from an explicit list. All boxes must share an index
     * type and none may be empty.
     */
    pub fn from_boxes(boxes: Vec<IndexBox<DIM>>) -> Result<Self> {
        let ix_type = boxes.first().map(|b| b.ix_type()).unwrap_or_default();

        if let Some(b) = boxes.iter().find(|b| b.ix_type() != ix_type) {
            return Err(Error::invalid(format!("box {} has a different index type from the first box", b)))
        }
        if let Some(b) = boxes.iter().find(|b| b.is_empty()) {
            return Err(Error::invalid(format!("box {} is empty", b)))
        }
        Ok(Self::from_parts(ix_type, boxes))
    }


    /**
     * Return the identity tag of this array. Clones share the tag; derived
     * arrays get a new one.
     */
    pub fn id(&self) -> u64 {
        self.inner.id
    }


    /**
     * Whether the two handles refer to the same array (not merely equal
     * boxes).
     */
    pub fn is_same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }


    pub fn len(&self) -> usize {
        self.inner.boxes.len()
    }


    pub fn is_empty(&self) -> bool {
        self.inner.boxes.is_empty()
    }


    pub fn ix_type(&self) -> IndexType<DIM> {
        self.inner.ix_type
    }


    /**
     * Return the box at position `i`.
     */
    pub fn get(&self, i: usize) -> Result<IndexBox<DIM>> {
        self.inner.boxes
            .get(i)
            .copied()
            .ok_or_else(|| Error::out_of_range("box", i, self.len()))
    }


    pub fn boxes(&self) -> &[IndexBox<DIM>] {
        &self.inner.boxes
    }


    pub fn iter(&self) -> impl Iterator<Item = &IndexBox<DIM>> {
        self.inner.boxes.iter()
    }


    fn derive<F>(&self, ix_type: IndexType<DIM>, f: F) -> Self
    where
        F: Fn(&IndexBox<DIM>) -> IndexBox<DIM>
    {
        Self::from_parts(ix_type, self.iter().map(f).collect())
    }


    /**
     * Chop every box so that no side is longer than `max_size` on the
     * corresponding axis.
     */
    pub fn max_size(&self, max_size: IntVect<DIM>) -> Result<Self> {
        if !max_size.all_ge(&IntVect::splat(1)) {
            return Err(Error::invalid(format!("max box size {} must be positive", max_size)))
        }
        Ok(Self::from_parts(self.ix_type(), self.iter().flat_map(|b| b.split(max_size)).collect()))
    }


    pub fn max_size_all(&self, max_size: i64) -> Result<Self> {
        self.max_size(IntVect::splat(max_size))
    }


    pub fn grow(&self, delta: IntVect<DIM>) -> Self {
        self.derive(self.ix_type(), |b| b.grow(delta))
    }


    pub fn grow_all(&self, delta: i64) -> Self {
        self.grow(IntVect::splat(delta))
    }


    pub fn convert(&self, ix_type: IndexType<DIM>) -> Self {
        self.derive(ix_type, |b| b.convert(ix_type))
    }


    pub fn surrounding_nodes(&self) -> Self {
        self.convert(IndexType::node())
    }


    pub fn enclosed_cells(&self) -> Self {
        self.convert(IndexType::cell())
    }


    pub fn coarsen(&self, ratio: IntVect<DIM>) -> Result<Self> {
        if !ratio.all_ge(&IntVect::splat(1)) {
            return Err(Error::invalid(format!("coarsening ratio {} must be positive", ratio)))
        }
        Ok(self.derive(self.ix_type(), |b| b.coarsen(ratio)))
    }


    pub fn refine(&self, ratio: IntVect<DIM>) -> Result<Self> {
        if !ratio.all_ge(&IntVect::splat(1)) {
            return Err(Error::invalid(format!("refinement ratio {} must be positive", ratio)))
        }
        Ok(self.derive(self.ix_type(), |b| b.refine(ratio)))
    }


    /**
     * Return the smallest box containing every box in the array.
     */
    pub fn minimal_box(&self) -> Option<IndexBox<DIM>> {
        let first = self.inner.boxes.first()?;
        let (lo, hi) = self.iter().fold((first.lo(), first.hi()), |(lo, hi), b| {
            (lo.elementwise_min(&b.lo()), hi.elementwise_max(&b.hi()))
        });
        Some(IndexBox::with_type(lo, hi, self.ix_type()))
    }


    /**
     * Return the total number of points covered by all boxes, counting
     * overlaps more than once.
     */
    pub fn num_pts(&self) -> usize {
        self.iter().map(|b| b.num_pts()).sum()
    }


    /**
     * Return the positions and overlaps of all boxes intersecting the given
     * box, in ascending position order.
     */
    pub fn intersections(&self, bx: &IndexBox<DIM>) -> Vec<(usize, IndexBox<DIM>)> {
        self.iter()
            .enumerate()
            .filter_map(|(i, b)| b.intersect(bx).map(|overlap| (i, overlap)))
            .collect()
    }


    /**
     * Determine whether no two boxes in the array overlap.
     */
    pub fn is_disjoint(&self) -> bool {
        self.iter()
            .enumerate()
            .all(|(i, a)| self.inner.boxes[i + 1..].iter().all(|b| !a.intersects(b)))
    }


    /**
     * Determine whether the union of boxes covers the given box. Only
     * meaningful for disjoint arrays.
     */
    pub fn contains_box(&self, bx: &IndexBox<DIM>) -> bool {
        let covered: usize = self.intersections(bx).iter().map(|(_, b)| b.num_pts()).sum();
        covered == bx.num_pts()
    }
}




// ============================================================================
impl<const DIM: usize> PartialEq for BoxArray<DIM> {
    fn eq(&self, other: &Self) -> bool {
        self.is_same(other) || (self.ix_type() == other.ix_type() && self.boxes() == other.boxes())
    }
}

impl<const DIM: usize> core::fmt::Debug for BoxArray<DIM> {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        fmt.debug_struct("BoxArray")
            .field("id", &self.id())
            .field("len", &self.len())
            .field("boxes", &self.inner.boxes)
            .finish()
    }
}
