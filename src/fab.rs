use core::ops::{Index, IndexMut, Range};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use crate::index_box::IndexBox;
use crate::int_vect::IntVect;




/**
 * Bound on the values a fab can hold: plain data that can cross threads and
 * be serialized for ghost exchange between ranks.
 */
pub trait Element: Copy + Default + Send + Sync + Serialize + DeserializeOwned + 'static {}

impl<T> Element for T where T: Copy + Default + Send + Sync + Serialize + DeserializeOwned + 'static {}




#[derive(Clone, Debug, Serialize, Deserialize)]

/**
 * A fab is a dense, multi-component array covering a box. The data is stored
 * in row-major order over the box (the final index increases fastest) with
 * the components of each index stored contiguously.
 */
pub struct Fab<T, const DIM: usize> {
    bx: IndexBox<DIM>,
    ncomp: usize,
    data: Vec<T>,
}




impl<T: Element, const DIM: usize> Fab<T, DIM> {




    /**
     * Allocate a fab over the given box, filled with `T::default()`.
     */
    pub fn new(bx: IndexBox<DIM>, ncomp: usize) -> Self {
        Self::filled(bx, ncomp, T::default())
    }


    pub fn filled(bx: IndexBox<DIM>, ncomp: usize, value: T) -> Self {
        Self { bx, ncomp, data: vec![value; bx.num_pts() * ncomp] }
    }


    /**
     * Generate a fab with values defined from a closure of index and
     * component.
     */
    pub fn from_function<F>(bx: IndexBox<DIM>, ncomp: usize, f: F) -> Self
    where
        F: Fn(IntVect<DIM>, usize) -> T
    {
        Self {
            bx,
            ncomp,
            data: bx.iter().flat_map(|i| (0..ncomp).map(move |n| (i, n))).map(|(i, n)| f(i, n)).collect(),
        }
    }




    pub fn bx(&self) -> &IndexBox<DIM> {
        &self.bx
    }


    pub fn ncomp(&self) -> usize {
        self.ncomp
    }


    pub fn len(&self) -> usize {
        self.data.len()
    }


    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }


    pub fn as_slice(&self) -> &[T] {
        &self.data
    }


    pub fn as_slice_mut(&mut self) -> &mut [T] {
        &mut self.data
    }


    /**
     * Return the position in the backing buffer of a given index and
     * component.
     */
    pub fn offset(&self, index: IntVect<DIM>, comp: usize) -> usize {
        self.bx.row_major_offset(index) * self.ncomp + comp
    }


    pub fn get(&self, index: IntVect<DIM>, comp: usize) -> Option<T> {
        if self.bx.contains(index) && comp < self.ncomp {
            Some(self.data[self.offset(index, comp)])
        } else {
            None
        }
    }


    pub fn get_mut(&mut self, index: IntVect<DIM>, comp: usize) -> Option<&mut T> {
        if self.bx.contains(index) && comp < self.ncomp {
            let n = self.offset(index, comp);
            Some(&mut self.data[n])
        } else {
            None
        }
    }


    pub fn view(&self) -> ArrayView<'_, T, DIM> {
        ArrayView { bx: self.bx, ncomp: self.ncomp, data: &self.data }
    }


    pub fn view_mut(&mut self) -> ArrayViewMut<'_, T, DIM> {
        ArrayViewMut { bx: self.bx, ncomp: self.ncomp, data: &mut self.data }
    }




    /**
     * Visit every value in the region and component range, in row-major
     * order with components fastest.
     */
    pub fn for_each_in<F>(&self, region: &IndexBox<DIM>, comps: Range<usize>, mut f: F)
    where
        F: FnMut(T)
    {
        self.validate_region(region, &comps);

        for index in region.iter() {
            let base = self.offset(index, 0);
            for &x in &self.data[base + comps.start .. base + comps.end] {
                f(x)
            }
        }
    }


    /**
     * Update every value in the region and component range in place.
     */
    pub fn update_in<F>(&mut self, region: &IndexBox<DIM>, comps: Range<usize>, mut f: F)
    where
        F: FnMut(&mut T)
    {
        self.validate_region(region, &comps);

        for index in region.iter() {
            let base = self.offset(index, 0);
            for x in &mut self.data[base + comps.start .. base + comps.end] {
                f(x)
            }
        }
    }


    /**
     * Combine values of another fab into this one over a region that both
     * contain. `src_comp` and `dst_comp` are the first components of the
     * range on each side.
     */
    pub fn update_from<F>(
        &mut self,
        src: &Self,
        region: &IndexBox<DIM>,
        src_comp: usize,
        dst_comp: usize,
        num_comp: usize,
        mut f: F)
    where
        F: FnMut(&mut T, T)
    {
        self.validate_region(region, &(dst_comp..dst_comp + num_comp));
        src.validate_region(region, &(src_comp..src_comp + num_comp));

        for index in region.iter() {
            let s = src.offset(index, src_comp);
            let d = self.offset(index, dst_comp);
            for (y, &x) in self.data[d..d + num_comp].iter_mut().zip(&src.data[s..s + num_comp]) {
                f(y, x)
            }
        }
    }


    /**
     * Combine values of two other fabs into this one. `f` receives the
     * destination value and one value from each source.
     */
    #[allow(clippy::too_many_arguments)]
    pub fn update_from_pair<F>(
        &mut self,
        x: (&Self, usize),
        y: (&Self, usize),
        region: &IndexBox<DIM>,
        dst_comp: usize,
        num_comp: usize,
        mut f: F)
    where
        F: FnMut(&mut T, T, T)
    {
        self.validate_region(region, &(dst_comp..dst_comp + num_comp));
        x.0.validate_region(region, &(x.1..x.1 + num_comp));
        y.0.validate_region(region, &(y.1..y.1 + num_comp));

        for index in region.iter() {
            let d = self.offset(index, dst_comp);
            let i = x.0.offset(index, x.1);
            let j = y.0.offset(index, y.1);
            for n in 0..num_comp {
                f(&mut self.data[d + n], x.0.data[i + n], y.0.data[j + n])
            }
        }
    }


    /**
     * Copy a region and component range into a new buffer.
     */
    pub fn pack(&self, region: &IndexBox<DIM>, comps: Range<usize>) -> Vec<T> {
        let mut buffer = Vec::with_capacity(region.num_pts() * comps.len());
        self.for_each_in(region, comps, |x| buffer.push(x));
        buffer
    }


    /**
     * Combine a buffer produced by `pack` (over a region of the same shape)
     * into a region of this fab.
     */
    pub fn unpack<F>(&mut self, region: &IndexBox<DIM>, comps: Range<usize>, buffer: &[T], mut f: F)
    where
        F: FnMut(&mut T, T)
    {
        assert_eq!(buffer.len(), region.num_pts() * comps.len(), "buffer does not match region");
        let mut values = buffer.iter();

        self.update_in(region, comps, |y| {
            if let Some(&x) = values.next() {
                f(y, x)
            }
        });
    }


    fn validate_region(&self, region: &IndexBox<DIM>, comps: &Range<usize>) {
        if !self.bx.contains_box(region) || comps.end > self.ncomp {
            panic!("region {} components {:?} out of range on fab {} with {} components",
                region,
                comps,
                self.bx,
                self.ncomp);
        }
    }
}




/**
 * Read-only view of one fab, indexed by `(index, component)`.
 */
pub struct ArrayView<'a, T, const DIM: usize> {
    bx: IndexBox<DIM>,
    ncomp: usize,
    data: &'a [T],
}




/**
 * Mutable view of one fab, indexed by `(index, component)`.
 */
pub struct ArrayViewMut<'a, T, const DIM: usize> {
    bx: IndexBox<DIM>,
    ncomp: usize,
    data: &'a mut [T],
}




// ============================================================================
impl<'a, T, const DIM: usize> ArrayView<'a, T, DIM> {

    pub fn bx(&self) -> &IndexBox<DIM> {
        &self.bx
    }

    pub fn extent(&self) -> IntVect<DIM> {
        self.bx.extent()
    }

    pub fn ncomp(&self) -> usize {
        self.ncomp
    }

    pub fn as_slice(&self) -> &[T] {
        self.data
    }

    pub fn get(&self, index: IntVect<DIM>, comp: usize) -> Option<&T> {
        checked_offset(&self.bx, self.ncomp, index, comp).map(|n| &self.data[n])
    }
}

impl<'a, T, const DIM: usize> ArrayViewMut<'a, T, DIM> {

    pub fn bx(&self) -> &IndexBox<DIM> {
        &self.bx
    }

    pub fn extent(&self) -> IntVect<DIM> {
        self.bx.extent()
    }

    pub fn ncomp(&self) -> usize {
        self.ncomp
    }

    pub fn as_slice(&self) -> &[T] {
        self.data
    }

    pub fn as_slice_mut(&mut self) -> &mut [T] {
        self.data
    }

    pub fn get(&self, index: IntVect<DIM>, comp: usize) -> Option<&T> {
        checked_offset(&self.bx, self.ncomp, index, comp).map(|n| &self.data[n])
    }

    pub fn get_mut(&mut self, index: IntVect<DIM>, comp: usize) -> Option<&mut T> {
        checked_offset(&self.bx, self.ncomp, index, comp).map(move |n| &mut self.data[n])
    }
}

impl<'a, T, const DIM: usize> Index<(IntVect<DIM>, usize)> for ArrayView<'a, T, DIM> {
    type Output = T;

    fn index(&self, (index, comp): (IntVect<DIM>, usize)) -> &T {
        &self.data[expect_offset(&self.bx, self.ncomp, index, comp)]
    }
}

impl<'a, T, const DIM: usize> Index<(IntVect<DIM>, usize)> for ArrayViewMut<'a, T, DIM> {
    type Output = T;

    fn index(&self, (index, comp): (IntVect<DIM>, usize)) -> &T {
        &self.data[expect_offset(&self.bx, self.ncomp, index, comp)]
    }
}

impl<'a, T, const DIM: usize> IndexMut<(IntVect<DIM>, usize)> for ArrayViewMut<'a, T, DIM> {
    fn index_mut(&mut self, (index, comp): (IntVect<DIM>, usize)) -> &mut T {
        &mut self.data[expect_offset(&self.bx, self.ncomp, index, comp)]
    }
}

fn checked_offset<const DIM: usize>(bx: &IndexBox<DIM>, ncomp: usize, index: IntVect<DIM>, comp: usize) -> Option<usize> {
    if bx.contains(index) && comp < ncomp {
        Some(bx.row_major_offset(index) * ncomp + comp)
    } else {
        None
    }
}

fn expect_offset<const DIM: usize>(bx: &IndexBox<DIM>, ncomp: usize, index: IntVect<DIM>, comp: usize) -> usize {
    match checked_offset(bx, ncomp, index, comp) {
        Some(n) => n,
        None => panic!("index {} component {} out of range on array {} with {} components", index, comp, bx, ncomp),
    }
}
