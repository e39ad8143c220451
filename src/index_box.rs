use core::fmt;
use serde::{Deserialize, Serialize};
use crate::int_vect::{IndexType, IntVect};




#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]

/**
 * Represents a rectangular region in a discrete DIM-dimensional index space.
 * The corners `lo` and `hi` are both inclusive. The box is empty if `hi <
 * lo` on any axis. Each axis is either cell-centered or nodal; a nodal axis
 * holds one more point than the cell-centered box it surrounds.
 */
pub struct IndexBox<const DIM: usize> {
    lo: IntVect<DIM>,
    hi: IntVect<DIM>,
    ix_type: IndexType<DIM>,
}




/**
 * Describes a rectangular index space. The index type is signed 64-bit integer.
 */
impl<const DIM: usize> IndexBox<DIM> {


    /**
     * Create a cell-centered box from its inclusive corners.
     */
    pub fn new<I: Into<IntVect<DIM>>>(lo: I, hi: I) -> Self {
        Self::with_type(lo, hi, IndexType::cell())
    }


    pub fn with_type<I: Into<IntVect<DIM>>>(lo: I, hi: I, ix_type: IndexType<DIM>) -> Self {
        Self { lo: lo.into(), hi: hi.into(), ix_type }
    }


    /**
     * Create a cell-centered box starting at `lo` with the given number of
     * points on each axis.
     */
    pub fn from_extent<I: Into<IntVect<DIM>>>(lo: I, extent: I) -> Self {
        let lo: IntVect<DIM> = lo.into();
        let extent: IntVect<DIM> = extent.into();
        Self::new(lo, lo + extent - IntVect::splat(1))
    }


    pub fn lo(&self) -> IntVect<DIM> {
        self.lo
    }


    pub fn hi(&self) -> IntVect<DIM> {
        self.hi
    }


    pub fn ix_type(&self) -> IndexType<DIM> {
        self.ix_type
    }


    pub fn is_cell_centered(&self) -> bool {
        self.ix_type.is_cell_centered()
    }


    /**
     * Return the number of indexes on each axis (zero on empty axes).
     */
    pub fn extent(&self) -> IntVect<DIM> {
        (self.hi - self.lo + IntVect::splat(1)).map(|n| n.max(0))
    }


    /**
     * Return the number of indexes along one axis.
     */
    pub fn length(&self, axis: usize) -> i64 {
        (self.hi[axis] - self.lo[axis] + 1).max(0)
    }


    pub fn is_empty(&self) -> bool {
        (0..DIM).any(|d| self.hi[d] < self.lo[d])
    }


    /**
     * Return the number of elements in this index space.
     */
    pub fn num_pts(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.extent().product()
        }
    }


    /**
     * Determine whether this index space contains the given index.
     */
    pub fn contains(&self, index: IntVect<DIM>) -> bool {
        index.all_ge(&self.lo) && index.all_le(&self.hi)
    }


    /**
     * Determine whether another index space is a subset of this one. The
     * empty box is a subset of everything.
     */
    pub fn contains_box(&self, other: &Self) -> bool {
        other.is_empty() || (self.ix_type == other.ix_type && self.contains(other.lo) && self.contains(other.hi))
    }


    /**
     * Return the overlap of two boxes, or `None` if they do not overlap or
     * have different index types.
     */
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        if self.ix_type != other.ix_type {
            return None
        }
        let result = Self {
            lo: self.lo.elementwise_max(&other.lo),
            hi: self.hi.elementwise_min(&other.hi),
            ix_type: self.ix_type,
        };
        if result.is_empty() { None } else { Some(result) }
    }


    pub fn intersects(&self, other: &Self) -> bool {
        self.intersect(other).is_some()
    }


    /**
     * Expand this index space by the given number of elements on each side,
     * per axis. Negative entries shrink the box.
     */
    pub fn grow(&self, delta: IntVect<DIM>) -> Self {
        Self { lo: self.lo - delta, hi: self.hi + delta, ix_type: self.ix_type }
    }


    /**
     * Expand this index space by the given number of elements on each axis.
     */
    pub fn grow_all(&self, delta: i64) -> Self {
        self.grow(IntVect::splat(delta))
    }


    /**
     * Move only the lower face of the given axis outwards.
     */
    pub fn grow_lo(&self, axis: usize, delta: i64) -> Self {
        let mut result = *self;
        result.lo[axis] -= delta;
        result
    }


    /**
     * Move only the upper face of the given axis outwards.
     */
    pub fn grow_hi(&self, axis: usize, delta: i64) -> Self {
        let mut result = *self;
        result.hi[axis] += delta;
        result
    }


    pub fn shift(&self, delta: IntVect<DIM>) -> Self {
        Self { lo: self.lo + delta, hi: self.hi + delta, ix_type: self.ix_type }
    }


    /**
     * Change the index type. An axis going from cell to node gains one point
     * on the high side; an axis going from node to cell loses one.
     */
    pub fn convert(&self, ix_type: IndexType<DIM>) -> Self {
        let mut hi = self.hi;

        for d in 0..DIM {
            match (self.ix_type.is_nodal(d), ix_type.is_nodal(d)) {
                (false, true) => hi[d] += 1,
                (true, false) => hi[d] -= 1,
                _ => (),
            }
        }
        Self { lo: self.lo, hi, ix_type }
    }


    pub fn surrounding_nodes(&self) -> Self {
        self.convert(IndexType::node())
    }


    pub fn enclosed_cells(&self) -> Self {
        self.convert(IndexType::cell())
    }


    /**
     * Coarsen by the given ratio. Cell axes round both corners down; nodal
     * axes round the upper corner up so the coarse box still covers every
     * fine node.
     */
    pub fn coarsen(&self, ratio: IntVect<DIM>) -> Self {
        let lo = self.lo.div_floor(&ratio);
        let mut hi = self.hi.div_floor(&ratio);

        for d in 0..DIM {
            if self.ix_type.is_nodal(d) && self.hi[d].rem_euclid(ratio[d]) != 0 {
                hi[d] += 1
            }
        }
        Self { lo, hi, ix_type: self.ix_type }
    }


    /**
     * Increase the resolution of this index space by the given factor.
     */
    pub fn refine(&self, ratio: IntVect<DIM>) -> Self {
        let lo = self.lo * ratio;
        let mut hi = self.hi * ratio;

        for d in 0..DIM {
            if !self.ix_type.is_nodal(d) {
                hi[d] += ratio[d] - 1
            }
        }
        Self { lo, hi, ix_type: self.ix_type }
    }


    /**
     * Return the part of this box not covered by `other`, as a list of
     * disjoint boxes. Slabs are peeled off one axis at a time.
     */
    pub fn difference(&self, other: &Self) -> Vec<Self> {
        let overlap = match self.intersect(other) {
            Some(overlap) => overlap,
            None => return if self.is_empty() { vec![] } else { vec![*self] },
        };
        let mut result = Vec::new();
        let mut rest = *self;

        for d in 0..DIM {
            if rest.lo[d] < overlap.lo[d] {
                let mut slab = rest;
                slab.hi[d] = overlap.lo[d] - 1;
                result.push(slab);
                rest.lo[d] = overlap.lo[d];
            }
            if rest.hi[d] > overlap.hi[d] {
                let mut slab = rest;
                slab.lo[d] = overlap.hi[d] + 1;
                result.push(slab);
                rest.hi[d] = overlap.hi[d];
            }
        }
        result
    }


    /**
     * Chop this box into pieces no longer than `max_size` on any axis.
     * Nodal boxes are chopped along their enclosed cells so that neighboring
     * pieces share their boundary nodes.
     */
    pub fn split(&self, max_size: IntVect<DIM>) -> Vec<Self> {
        let cells = self.enclosed_cells();
        let mut counts = [0; DIM];

        for d in 0..DIM {
            let len = cells.length(d);
            counts[d] = ((len + max_size[d] - 1) / max_size[d]).max(1);
        }
        cells.partition(counts).into_iter().map(|b| b.convert(self.ix_type)).collect()
    }


    /**
     * Divide this (cell-centered) box into tiles of roughly `tile_size`.
     * The number of tiles on an axis is the box length divided by the tile
     * size, at least one; leftover cells are spread over the leading tiles.
     */
    pub fn tiles(&self, tile_size: IntVect<DIM>) -> Vec<Self> {
        let mut counts = [0; DIM];

        for d in 0..DIM {
            counts[d] = (self.length(d) / tile_size[d].max(1)).max(1);
        }
        self.partition(counts)
    }


    fn partition(&self, counts: [i64; DIM]) -> Vec<Self> {
        let ranges: Vec<Vec<(i64, i64)>> = (0..DIM)
            .map(|d| split_range(self.lo[d], self.length(d), counts[d]))
            .collect();
        let grid = IndexBox::<DIM>::new(IntVect::zero(), IntVect::new(counts) - IntVect::splat(1));

        grid.iter()
            .map(|n| {
                let mut piece = *self;
                for d in 0..DIM {
                    let (lo, hi) = ranges[d][n[d] as usize];
                    piece.lo[d] = lo;
                    piece.hi[d] = hi;
                }
                piece
            })
            .collect()
    }


    /**
     * Return the linear offset for the given index, in a row-major memory
     * buffer aligned with the start of this index space.
     */
    pub fn row_major_offset(&self, index: IntVect<DIM>) -> usize {
        let mut offset = 0;

        for d in 0..DIM {
            offset = offset * self.length(d) as usize + (index[d] - self.lo[d]) as usize;
        }
        offset
    }


    /**
     * Return an iterator which traverses the index space in row-major order
     * (C-like; the final index increases fastest).
     */
    pub fn iter(&self) -> BoxIter<DIM> {
        BoxIter {
            lo: self.lo,
            hi: self.hi,
            next: if self.is_empty() { None } else { Some(self.lo) },
        }
    }
}

impl<const DIM: usize> fmt::Display for IndexBox<DIM> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "({} {} {})", self.lo, self.hi, self.ix_type.as_int_vect())
    }
}




/**
 * Split `len` indexes starting at `start` into `count` contiguous inclusive
 * ranges whose lengths differ by at most one.
 */
fn split_range(start: i64, len: i64, count: i64) -> Vec<(i64, i64)> {
    let base = len / count;
    let rem = len % count;
    let mut cursor = start;

    (0..count)
        .map(|n| {
            let size = base + i64::from(n < rem);
            let range = (cursor, cursor + size - 1);
            cursor += size;
            range
        })
        .collect()
}




/**
 * Row-major iterator over the indexes of a box.
 */
pub struct BoxIter<const DIM: usize> {
    lo: IntVect<DIM>,
    hi: IntVect<DIM>,
    next: Option<IntVect<DIM>>,
}




// ============================================================================
impl<const DIM: usize> Iterator for BoxIter<DIM> {
    type Item = IntVect<DIM>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        let mut index = current;
        let mut axis = DIM;

        self.next = loop {
            if axis == 0 {
                break None
            }
            axis -= 1;

            if index[axis] < self.hi[axis] {
                index[axis] += 1;
                break Some(index)
            }
            index[axis] = self.lo[axis];
        };
        Some(current)
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use crate::int_vect::{IndexType, IntVect};
    use super::IndexBox;

    fn bx(lo: [i64; 2], hi: [i64; 2]) -> IndexBox<2> {
        IndexBox::new(lo, hi)
    }

    #[test]
    fn extent_and_num_pts_work() {
        let b = bx([0, 0], [3, 1]);
        assert_eq!(b.extent(), IntVect::new([4, 2]));
        assert_eq!(b.num_pts(), 8);
        assert!(bx([0, 0], [-1, 3]).is_empty());
        assert_eq!(bx([0, 0], [-1, 3]).num_pts(), 0);
    }

    #[test]
    fn convert_adds_a_node_on_nodal_axes() {
        let b = bx([0, 0], [3, 3]).convert(IndexType::face(0));
        assert_eq!(b.extent(), IntVect::new([5, 4]));
        assert_eq!(b.enclosed_cells(), bx([0, 0], [3, 3]));
    }

    #[test]
    fn coarsen_and_refine_work() {
        let b = bx([-1, -2], [4, 5]);
        assert_eq!(b.coarsen(IntVect::splat(2)), bx([-1, -1], [2, 2]));
        assert_eq!(b.refine(IntVect::new([2, 3])), bx([-2, -6], [9, 17]));

        let n = bx([0, 0], [3, 3]).surrounding_nodes();
        assert_eq!(n.coarsen(IntVect::splat(2)).hi(), IntVect::new([2, 2]));
        assert_eq!(n.refine(IntVect::splat(2)).hi(), IntVect::new([8, 8]));
    }

    #[test]
    fn intersection_requires_matching_type() {
        let a = bx([0, 0], [3, 3]);
        let b = bx([2, 2], [5, 5]);
        assert_eq!(a.intersect(&b), Some(bx([2, 2], [3, 3])));
        assert_eq!(a.intersect(&b.surrounding_nodes()), None);
        assert_eq!(a.intersect(&bx([4, 0], [5, 3])), None);
    }

    #[test]
    fn intersection_of_crossing_boxes_is_elementwise() {
        let a = bx([0, 4], [7, 7]);
        let b = bx([2, 0], [5, 9]);
        assert_eq!(a.intersect(&b), Some(bx([2, 4], [5, 7])));
        assert_eq!(b.intersect(&a), Some(bx([2, 4], [5, 7])));
    }

    #[test]
    fn iteration_is_row_major() {
        let points: Vec<_> = bx([0, 0], [1, 2]).iter().map(|p| *p.as_array()).collect();
        assert_eq!(points, vec![[0, 0], [0, 1], [0, 2], [1, 0], [1, 1], [1, 2]]);

        let b = bx([2, 3], [5, 7]);
        for (n, p) in b.iter().enumerate() {
            assert_eq!(b.row_major_offset(p), n);
        }
    }

    #[test]
    fn difference_covers_the_remainder() {
        let outer = bx([0, 0], [5, 5]);
        let inner = bx([1, 1], [4, 4]);
        let pieces = outer.difference(&inner);
        assert_eq!(pieces.iter().map(|p| p.num_pts()).sum::<usize>(), 36 - 16);

        for (n, a) in pieces.iter().enumerate() {
            assert!(!a.intersects(&inner));
            for b in &pieces[n + 1..] {
                assert!(!a.intersects(b));
            }
        }
        assert!(inner.difference(&outer).is_empty());
    }

    #[test]
    fn split_respects_max_size() {
        let pieces = bx([0, 0], [9, 4]).split(IntVect::new([4, 8]));
        assert_eq!(pieces.len(), 3);
        assert!(pieces.iter().all(|p| p.length(0) <= 4 && p.length(1) == 5));
        assert_eq!(pieces.iter().map(|p| p.num_pts()).sum::<usize>(), 50);
    }

    #[test]
    fn nodal_split_pieces_share_faces() {
        let pieces = bx([0, 0], [7, 3]).surrounding_nodes().split(IntVect::splat(4));
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0].hi()[0], 4);
        assert_eq!(pieces[1].lo()[0], 4);
    }

    #[test]
    fn tiles_partition_the_box() {
        let b = bx([0, 0], [9, 9]);
        let tiles = b.tiles(IntVect::new([4, 16]));
        assert_eq!(tiles.len(), 2);
        assert_eq!(tiles[0], bx([0, 0], [4, 9]));
        assert_eq!(tiles[1], bx([5, 0], [9, 9]));
    }
}
