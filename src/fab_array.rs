use std::sync::Arc;
use core::ops::Add;
use log::debug;
use rayon::prelude::*;
use crate::box_array::BoxArray;
use crate::copier::{CopyOp, CopyPlan};
use crate::distribution_mapping::DistributionMapping;
use crate::error::{Error, Result};
use crate::fab::{ArrayView, ArrayViewMut, Element, Fab};
use crate::fab_array_base::{FabArrayBase, Layout};
use crate::index_box::IndexBox;
use crate::int_vect::IntVect;
use crate::message::Communicator;
use crate::mf_iter::MFIter;
use crate::periodicity::Periodicity;
use crate::selection::{validate_comps, validate_ghost, Combine, Selection, Transfer};




/**
 * A distributed block-structured array: one fab per box owned by this rank,
 * each covering its box grown by the ghost width and holding `ncomp`
 * components. Fabs are stored in local index order.
 *
 * Bulk operations visit the local fabs on the rayon pool. Per-fab partial
 * results are always combined in local index order, so results do not
 * depend on thread scheduling.
 */
#[derive(Clone)]
pub struct FabArray<T, const DIM: usize> {
    base: FabArrayBase<DIM>,
    fabs: Vec<Fab<T, DIM>>,
}




/**
 * The floating-point specialization, which carries the arithmetic and the
 * reductions.
 */
pub type MultiFab<const DIM: usize> = FabArray<f64, DIM>;




// ============================================================================
impl<T: Element, const DIM: usize> FabArray<T, DIM> {




    /**
     * An undefined array. Every query fails with `NotDefined` until `define`
     * is called.
     */
    pub fn new() -> Self {
        Self { base: FabArrayBase::new(), fabs: Vec::new() }
    }


    /**
     * Create and define an array in one step.
     */
    pub fn from_layout(
        box_array: BoxArray<DIM>,
        distribution_map: DistributionMapping,
        ncomp: usize,
        ngrow: IntVect<DIM>,
        comm: Arc<dyn Communicator>) -> Result<Self>
    {
        let mut result = Self::new();
        result.define(box_array, distribution_map, ncomp, ngrow, comm)?;
        Ok(result)
    }


    /**
     * Create an array over the same boxes, ownership and communicator as
     * `other`, with its own component count and ghost width.
     */
    pub fn like<U: Element>(other: &FabArray<U, DIM>, ncomp: usize, ngrow: IntVect<DIM>) -> Result<Self> {
        let layout = other.layout()?;
        Self::from_layout(
            layout.box_array().clone(),
            layout.distribution_map().clone(),
            ncomp,
            ngrow,
            layout.communicator().clone())
    }


    /**
     * Allocate one fab per local box, filled with `T::default()`. Any
     * previous storage is released. On failure the array is left as it
     * was.
     */
    pub fn define(
        &mut self,
        box_array: BoxArray<DIM>,
        distribution_map: DistributionMapping,
        ncomp: usize,
        ngrow: IntVect<DIM>,
        comm: Arc<dyn Communicator>) -> Result<()>
    {
        let mut base = FabArrayBase::new();
        base.define(box_array, distribution_map, ncomp, ngrow, comm)?;

        let layout = base.layout()?;
        let fabs = layout
            .local_indices()
            .par_iter()
            .map(|&i| Ok(Fab::new(layout.fab_box(i)?, ncomp)))
            .collect::<Result<Vec<_>>>()?;

        self.base = base;
        self.fabs = fabs;
        Ok(())
    }


    /**
     * Deep copy of `num_comp` components starting at `src_comp` of `src`,
     * with a ghost width of `ngrow` (at most the source's). Ghost values
     * are copied as well.
     */
    pub fn from_components(src: &Self, src_comp: usize, num_comp: usize, ngrow: IntVect<DIM>) -> Result<Self> {
        let mut result = Self::like(src, num_comp, ngrow)?;
        Self::copy(&mut result, src, &Transfer::new(src_comp, 0, num_comp).with_ghost(ngrow))?;
        Ok(result)
    }




    pub fn base(&self) -> &FabArrayBase<DIM> {
        &self.base
    }


    pub(crate) fn layout(&self) -> Result<&Arc<Layout<DIM>>> {
        self.base.layout()
    }


    pub fn is_defined(&self) -> bool {
        self.base.is_defined()
    }


    pub fn n_comp(&self) -> Result<usize> {
        self.base.n_comp()
    }


    pub fn n_grow_vect(&self) -> Result<IntVect<DIM>> {
        self.base.n_grow_vect()
    }


    pub fn box_array(&self) -> Result<&BoxArray<DIM>> {
        self.base.box_array()
    }


    pub fn distribution_map(&self) -> Result<&DistributionMapping> {
        self.base.distribution_map()
    }


    /**
     * The local fabs, in local index order.
     */
    pub fn fabs(&self) -> &[Fab<T, DIM>] {
        &self.fabs
    }


    /**
     * The fab of global box `i`, or `None` if another rank owns it.
     */
    pub fn get(&self, i: usize) -> Result<Option<&Fab<T, DIM>>> {
        Ok(self.base.local_index_of(i)?.map(|k| &self.fabs[k]))
    }


    pub fn get_mut(&mut self, i: usize) -> Result<Option<&mut Fab<T, DIM>>> {
        Ok(self.base.local_index_of(i)?.map(move |k| &mut self.fabs[k]))
    }


    fn check_iter(&self, mfi: &MFIter<DIM>) -> Result<usize> {
        let k = mfi.local_index()?;

        if !self.layout()?.is_compatible(mfi.layout()) {
            return Err(Error::IncompatibleLayout)
        }
        Ok(k)
    }


    /**
     * A mutable view of the fab the iterator is positioned on. The iterator
     * may have been built over any array with a compatible layout.
     */
    pub fn array(&mut self, mfi: &MFIter<DIM>) -> Result<ArrayViewMut<'_, T, DIM>> {
        let k = self.check_iter(mfi)?;
        Ok(self.fabs[k].view_mut())
    }


    pub fn const_array(&self, mfi: &MFIter<DIM>) -> Result<ArrayView<'_, T, DIM>> {
        let k = self.check_iter(mfi)?;
        Ok(self.fabs[k].view())
    }




    /**
     * The region of each local fab covered by the valid box grown by
     * `ghost` and clipped to `sub_box`, in local index order.
     */
    fn regions(&self, ghost: IntVect<DIM>, sub_box: Option<IndexBox<DIM>>) -> Result<Vec<Option<IndexBox<DIM>>>> {
        let layout = self.layout()?;
        let selection = Selection { ghost, sub_box, ..Selection::default() };

        layout.local_indices()
            .iter()
            .map(|&i| Ok(selection.region(&layout.box_at(i)?)))
            .collect()
    }


    /**
     * Apply `f` to every selected value, in place.
     */
    pub fn apply<F>(&mut self, selection: &Selection<DIM>, f: F) -> Result<()>
    where
        F: Fn(&mut T) + Sync
    {
        selection.validate(self.n_comp()?, self.n_grow_vect()?, self.box_array()?.ix_type())?;
        let regions = self.regions(selection.ghost, selection.sub_box)?;
        let comps = selection.comp_range();

        self.fabs.par_iter_mut().zip(regions).for_each(|(fab, region)| {
            if let Some(region) = region {
                fab.update_in(&region, comps.clone(), &f)
            }
        });
        Ok(())
    }


    /**
     * Compute one value per local fab from the selected region of it. `f`
     * receives the local index, the fab and the region. Fabs with nothing
     * selected are skipped; results are in local index order.
     */
    pub fn map_fabs<R, F>(&self, selection: &Selection<DIM>, f: F) -> Result<Vec<R>>
    where
        R: Send,
        F: Fn(usize, &Fab<T, DIM>, &IndexBox<DIM>) -> R + Sync
    {
        selection.validate(self.n_comp()?, self.n_grow_vect()?, self.box_array()?.ix_type())?;
        let regions = self.regions(selection.ghost, selection.sub_box)?;

        Ok(self.fabs
            .par_iter()
            .zip(regions)
            .enumerate()
            .filter_map(|(k, (fab, region))| region.map(|r| f(k, fab, &r)))
            .collect())
    }


    /**
     * Combine `src` into `dst` value by value, over the valid regions grown
     * by the transfer's ghost width. Fails with `IncompatibleLayout` unless
     * the two arrays share a decomposition.
     */
    pub fn zip_apply<U, F>(dst: &mut Self, src: &FabArray<U, DIM>, transfer: &Transfer<DIM>, f: F) -> Result<()>
    where
        U: Element,
        F: Fn(&mut T, U) + Sync
    {
        dst.base.check_compatible(&src.base)?;
        validate_comps(transfer.dst_comp, transfer.num_comp, dst.n_comp()?)?;
        validate_comps(transfer.src_comp, transfer.num_comp, src.n_comp()?)?;
        validate_ghost(transfer.ghost, dst.n_grow_vect()?)?;
        validate_ghost(transfer.ghost, src.n_grow_vect()?)?;

        let regions = dst.regions(transfer.ghost, None)?;
        let t = *transfer;

        dst.fabs.par_iter_mut().zip(src.fabs.par_iter()).zip(regions).for_each(|((y, x), region)| {
            if let Some(region) = region {
                for index in region.iter() {
                    let i = x.offset(index, t.src_comp);
                    let j = y.offset(index, t.dst_comp);
                    for n in 0..t.num_comp {
                        f(&mut y.as_slice_mut()[j + n], x.as_slice()[i + n])
                    }
                }
            }
        });
        Ok(())
    }


    /**
     * Set `dst = f(dst, x, y)` value by value over the valid regions grown
     * by the ghost width of `combine`.
     */
    pub fn zip2_apply<F>(dst: &mut Self, x: &Self, y: &Self, combine: &Combine<DIM>, f: F) -> Result<()>
    where
        F: Fn(&mut T, T, T) + Sync
    {
        dst.base.check_compatible(&x.base)?;
        dst.base.check_compatible(&y.base)?;
        validate_comps(combine.dst_comp, combine.num_comp, dst.n_comp()?)?;
        validate_comps(combine.x_comp, combine.num_comp, x.n_comp()?)?;
        validate_comps(combine.y_comp, combine.num_comp, y.n_comp()?)?;

        for ngrow in [dst.n_grow_vect()?, x.n_grow_vect()?, y.n_grow_vect()?] {
            validate_ghost(combine.ghost, ngrow)?
        }
        let regions = dst.regions(combine.ghost, None)?;
        let c = *combine;

        dst.fabs.par_iter_mut().zip(x.fabs.par_iter().zip(y.fabs.par_iter())).zip(regions).for_each(|((d, (a, b)), region)| {
            if let Some(region) = region {
                d.update_from_pair((a, c.x_comp), (b, c.y_comp), &region, c.dst_comp, c.num_comp, &f)
            }
        });
        Ok(())
    }




    /**
     * Set every selected value to `value`.
     */
    pub fn set_val(&mut self, value: T, selection: &Selection<DIM>) -> Result<()> {
        self.apply(selection, |x| *x = value)
    }


    /**
     * Set every value, ghosts included, in every component.
     */
    pub fn set_val_all(&mut self, value: T) {
        self.fabs.par_iter_mut().for_each(|fab| fab.as_slice_mut().iter_mut().for_each(|x| *x = value))
    }


    /**
     * Copy components from `src` into `dst`. Both must share a
     * decomposition.
     */
    pub fn copy(dst: &mut Self, src: &Self, transfer: &Transfer<DIM>) -> Result<()> {
        Self::zip_apply(dst, src, transfer, |y, x| *y = x)
    }


    /**
     * Exchange components between two arrays that share a decomposition.
     */
    pub fn swap(a: &mut Self, b: &mut Self, transfer: &Transfer<DIM>) -> Result<()> {
        a.base.check_compatible(&b.base)?;
        validate_comps(transfer.dst_comp, transfer.num_comp, a.n_comp()?)?;
        validate_comps(transfer.src_comp, transfer.num_comp, b.n_comp()?)?;
        validate_ghost(transfer.ghost, a.n_grow_vect()?)?;
        validate_ghost(transfer.ghost, b.n_grow_vect()?)?;

        let regions = a.regions(transfer.ghost, None)?;
        let t = *transfer;

        a.fabs.par_iter_mut().zip(b.fabs.par_iter_mut()).zip(regions).for_each(|((x, y), region)| {
            if let Some(region) = region {
                for index in region.iter() {
                    let i = x.offset(index, t.dst_comp);
                    let j = y.offset(index, t.src_comp);
                    for n in 0..t.num_comp {
                        core::mem::swap(&mut x.as_slice_mut()[i + n], &mut y.as_slice_mut()[j + n])
                    }
                }
            }
        });
        Ok(())
    }




    /**
     * Fill the ghost cells of components `comp..comp + num_comp` from the
     * valid cells of the boxes (and periodic images of boxes) that cover
     * them. Ghost cells covered by nothing are left alone.
     */
    pub fn fill_boundary(&mut self, comp: usize, num_comp: usize, period: &Periodicity<DIM>) -> Result<()> {
        let layout = self.layout()?.clone();
        validate_comps(comp, num_comp, layout.ncomp())?;

        let plan = CopyPlan::build(
            &layout,
            &layout,
            |i| Ok(layout.fab_box(i)?.difference(&layout.box_at(i)?)),
            |j| layout.box_at(j),
            period)?;

        debug!("[{}] fill_boundary: {} regions", layout.rank(), plan.len());
        let buffers = plan.gather(&layout, &self.fabs, comp, num_comp)?;
        plan.scatter(&layout, &mut self.fabs, buffers, comp, num_comp, |y, x| *y = x)
    }


    /**
     * Owner mask: 1 where this box owns a point, 0 where the same point
     * (possibly through a periodic image) also lies in a box with a lower
     * index. Within one box, of the periodic copies of a point only the
     * lexicographically greatest is owned. Every point of the domain thus
     * has exactly one owner.
     */
    pub fn owner_mask(&self, period: &Periodicity<DIM>) -> Result<FabArray<i32, DIM>> {
        let layout = self.layout()?;
        let mut mask = FabArray::<i32, DIM>::like(self, 1, IntVect::zero())?;
        let shifts = period.shifts();
        let boxes = layout.box_array();

        mask.set_val_all(1);
        mask.fabs.par_iter_mut().zip(layout.local_indices()).for_each(|(fab, &i)| {
            let valid = boxes.boxes()[i];

            for (j, other) in boxes.iter().enumerate().take(i + 1) {
                for &shift in &shifts {
                    if j < i || shift < IntVect::zero() {
                        if let Some(region) = valid.intersect(&other.shift(shift)) {
                            fab.update_in(&region, 0..1, |m| *m = 0)
                        }
                    }
                }
            }
        });
        Ok(mask)
    }


    /**
     * Overlap mask: the number of boxes (periodic images included) that
     * cover each valid point.
     */
    pub fn overlap_mask(&self, period: &Periodicity<DIM>) -> Result<FabArray<f64, DIM>> {
        let layout = self.layout()?;
        let mut mask = FabArray::<f64, DIM>::like(self, 1, IntVect::zero())?;
        let shifts = period.shifts();
        let boxes = layout.box_array();

        mask.fabs.par_iter_mut().zip(layout.local_indices()).for_each(|(fab, &i)| {
            let valid = boxes.boxes()[i];

            for other in boxes.iter() {
                for &shift in &shifts {
                    if let Some(region) = valid.intersect(&other.shift(shift)) {
                        fab.update_in(&region, 0..1, |m| *m += 1.0)
                    }
                }
            }
        });
        Ok(mask)
    }
}




// ============================================================================
impl<T, const DIM: usize> FabArray<T, DIM>
where
    T: Element + Add<Output = T>
{




    /**
     * Copy (or add) components of `src` into this array. The two arrays may
     * have entirely different box arrays and mappings, as long as the index
     * types agree. Source points are taken from the valid boxes grown by
     * `src_ng`; destination points from the valid boxes grown by the
     * transfer's ghost width. Periodic images of the source are included.
     *
     * Where several source boxes cover a destination point, `Copy` keeps
     * the value from the last of them (in box order) and `Add` sums all of
     * them.
     */
    pub fn parallel_copy(
        &mut self,
        src: &Self,
        transfer: &Transfer<DIM>,
        src_ng: IntVect<DIM>,
        period: &Periodicity<DIM>,
        op: CopyOp) -> Result<()>
    {
        let dst_layout = self.layout()?.clone();
        let src_layout = src.layout()?.clone();

        if dst_layout.box_array().ix_type() != src_layout.box_array().ix_type() {
            return Err(Error::invalid("parallel copy between arrays of different index types"))
        }
        validate_comps(transfer.dst_comp, transfer.num_comp, dst_layout.ncomp())?;
        validate_comps(transfer.src_comp, transfer.num_comp, src_layout.ncomp())?;
        validate_ghost(transfer.ghost, dst_layout.ngrow())?;
        validate_ghost(src_ng, src_layout.ngrow())?;

        let plan = CopyPlan::build(
            &src_layout,
            &dst_layout,
            |i| Ok(vec![dst_layout.box_at(i)?.grow(transfer.ghost)]),
            |j| Ok(src_layout.box_at(j)?.grow(src_ng)),
            period)?;

        debug!("[{}] parallel_copy: {} regions ({:?})", dst_layout.rank(), plan.len(), op);

        match op {
            CopyOp::Copy => plan.execute(&src_layout, &src.fabs, &dst_layout, &mut self.fabs, transfer.src_comp, transfer.dst_comp, transfer.num_comp, |y, x| *y = x),
            CopyOp::Add => plan.execute(&src_layout, &src.fabs, &dst_layout, &mut self.fabs, transfer.src_comp, transfer.dst_comp, transfer.num_comp, |y, x| *y = *y + x),
        }
    }


    /**
     * Replace each valid value with the sum of every value (valid or ghost,
     * in this or any other box, periodic images included) that sits at the
     * same point. Ghost values are not reset, so calling this twice counts
     * them twice.
     */
    pub fn sum_boundary(&mut self, comp: usize, num_comp: usize, period: &Periodicity<DIM>) -> Result<()> {
        let ngrow = self.n_grow_vect()?;
        self.sum_into_valid(comp, num_comp, ngrow, period)
    }


    /**
     * Like `sum_boundary`, but only ghost values within `src_ng` of their
     * box are summed. `src_ng` may not exceed the allocated ghost width.
     */
    pub fn sum_boundary_with_ghost(&mut self, comp: usize, num_comp: usize, src_ng: IntVect<DIM>, period: &Periodicity<DIM>) -> Result<()> {
        validate_ghost(src_ng, self.n_grow_vect()?)?;
        self.sum_into_valid(comp, num_comp, src_ng, period)
    }


    /**
     * Make every copy of a shared point (nodal box faces, periodic images)
     * hold the value of its owner, as defined by `owner_mask`. Calling this
     * twice is the same as calling it once.
     */
    pub fn override_sync(&mut self, comp: usize, num_comp: usize, period: &Periodicity<DIM>) -> Result<()> {
        validate_comps(comp, num_comp, self.n_comp()?)?;
        let mask = self.owner_mask(period)?;
        let regions = self.regions(IntVect::zero(), None)?;

        self.fabs.par_iter_mut().zip(&mask.fabs).zip(regions).for_each(|((fab, m), region)| {
            if let Some(region) = region {
                for index in region.iter() {
                    if m.get(index, 0) == Some(0) {
                        let i = fab.offset(index, comp);
                        fab.as_slice_mut()[i..i + num_comp].iter_mut().for_each(|x| *x = T::default())
                    }
                }
            }
        });
        self.sum_into_valid(comp, num_comp, IntVect::zero(), period)
    }


    pub(crate) fn sum_into_valid(&mut self, comp: usize, num_comp: usize, src_ng: IntVect<DIM>, period: &Periodicity<DIM>) -> Result<()> {
        let layout = self.layout()?.clone();
        validate_comps(comp, num_comp, layout.ncomp())?;

        let plan = CopyPlan::build(
            &layout,
            &layout,
            |i| Ok(vec![layout.box_at(i)?]),
            |j| Ok(layout.box_at(j)?.grow(src_ng)),
            period)?;

        debug!("[{}] sum into valid cells: {} regions", layout.rank(), plan.len());
        let buffers = plan.gather(&layout, &self.fabs, comp, num_comp)?;
        self.apply(&Selection::comps(comp, num_comp), |x| *x = T::default())?;
        plan.scatter(&layout, &mut self.fabs, buffers, comp, num_comp, |y, x| *y = *y + x)
    }
}

impl<T: Element, const DIM: usize> Default for FabArray<T, DIM> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const DIM: usize> AsRef<FabArrayBase<DIM>> for FabArray<T, DIM> {
    fn as_ref(&self) -> &FabArrayBase<DIM> {
        &self.base
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use std::sync::Arc;
    use crate::box_array::BoxArray;
    use crate::copier::CopyOp;
    use crate::distribution_mapping::{DistributionMapping, RoundRobin};
    use crate::error::Error;
    use crate::index_box::IndexBox;
    use crate::int_vect::{IndexType, IntVect};
    use crate::message::{ChannelCommunicator, Communicator, SerialCommunicator};
    use crate::mf_iter::MFIter;
    use crate::periodicity::Periodicity;
    use crate::selection::{Selection, Transfer};
    use super::{FabArray, MultiFab};

    fn serial<const DIM: usize>(ba: BoxArray<DIM>, ncomp: usize, ngrow: i64) -> MultiFab<DIM> {
        let dm = DistributionMapping::single_rank(&ba);
        MultiFab::from_layout(ba, dm, ncomp, IntVect::splat(ngrow), Arc::new(SerialCommunicator)).unwrap()
    }

    fn fill_valid<const DIM: usize, F>(mf: &mut MultiFab<DIM>, f: F)
    where
        F: Fn(usize, IntVect<DIM>) -> f64
    {
        let mut mfi = MFIter::new(&*mf).unwrap();

        while mfi.is_valid() {
            let i = mfi.index().unwrap();
            let valid = mfi.valid_box().unwrap();
            let mut a = mf.array(&mfi).unwrap();
            for p in valid.iter() {
                for n in 0..a.ncomp() {
                    a[(p, n)] = f(i, p)
                }
            }
            mfi.advance().unwrap();
        }
    }

    fn line(ngrow: i64) -> MultiFab<1> {
        serial(BoxArray::from_domain(IndexBox::new([0], [7])).max_size_all(4).unwrap(), 1, ngrow)
    }

    fn nodal_line() -> MultiFab<1> {
        let ba = BoxArray::from_domain(IndexBox::new([0], [7])).max_size_all(4).unwrap().convert(IndexType::node());
        serial(ba, 1, 0)
    }

    fn value<const DIM: usize>(mf: &MultiFab<DIM>, i: usize, p: [i64; DIM]) -> Option<f64> {
        mf.get(i).unwrap().and_then(|fab| fab.get(IntVect::new(p), 0))
    }

    fn run_group<F, T>(num_peers: usize, f: F) -> Vec<T>
    where
        F: Fn(Arc<dyn Communicator>) -> T + Sync,
        T: Send,
    {
        let f = &f;
        std::thread::scope(|scope| {
            let handles: Vec<_> = ChannelCommunicator::group(num_peers)
                .into_iter()
                .map(|comm| scope.spawn(move || f(Arc::new(comm))))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
    }

    #[test]
    fn define_allocates_grown_fabs() {
        let ba = BoxArray::from_domain(IndexBox::new([0, 0], [7, 7])).max_size_all(4).unwrap();
        let mut mf = serial(ba.clone(), 3, 2);
        let mut mfi = MFIter::new(&mf).unwrap();

        while mfi.is_valid() {
            let extent = ba.get(mfi.index().unwrap()).unwrap().grow_all(2).extent();
            let a = mf.array(&mfi).unwrap();
            assert_eq!(a.extent(), extent);
            assert_eq!(a.ncomp(), 3);
            assert_eq!(a.as_slice().len(), 8 * 8 * 3);
            mfi.advance().unwrap();
        }
        assert!(matches!(mf.array(&mfi), Err(Error::InvalidState(_))));
        assert!(matches!(mf.const_array(&mfi), Err(Error::InvalidState(_))));
    }

    #[test]
    fn redefine_replaces_storage() {
        let mut mf = line(1);
        let old = MFIter::new(&mf).unwrap();
        mf.define(
            BoxArray::from_domain(IndexBox::new([0], [15])),
            DistributionMapping::from_ranks(vec![0]),
            2,
            IntVect::zero(),
            Arc::new(SerialCommunicator)).unwrap();
        assert_eq!(mf.fabs().len(), 1);
        assert_eq!(mf.fabs()[0].len(), 32);
        assert!(matches!(mf.const_array(&old), Err(Error::IncompatibleLayout)));
        assert!(mf.define(BoxArray::from_domain(IndexBox::new([0], [3])), DistributionMapping::from_ranks(vec![0]), 0, IntVect::zero(), Arc::new(SerialCommunicator)).is_err());
        assert_eq!(mf.n_comp(), Ok(2));
    }

    #[test]
    fn undefined_array_reports_not_defined() {
        let mf = MultiFab::<2>::new();
        assert_eq!(mf.n_comp(), Err(Error::NotDefined));
        assert!(matches!(MFIter::new(&mf), Err(Error::NotDefined)));
    }

    #[test]
    fn iterator_from_a_compatible_array_can_index_another() {
        let a = line(0);
        let mut b = MultiFab::like(&a, 2, IntVect::splat(1)).unwrap();
        let mfi = MFIter::new(&a).unwrap();
        assert_eq!(b.array(&mfi).unwrap().extent(), IntVect::new([6]));
    }

    #[test]
    fn fill_boundary_copies_neighbors() {
        let mut mf = line(1);
        mf.set_val(-1.0, &Selection::default().with_ghost_all(1)).unwrap();
        fill_valid(&mut mf, |_, p| p[0] as f64);
        mf.fill_boundary(0, 1, &Periodicity::non_periodic()).unwrap();
        assert_eq!(value(&mf, 0, [4]), Some(4.0));
        assert_eq!(value(&mf, 0, [-1]), Some(-1.0));
        assert_eq!(value(&mf, 1, [3]), Some(3.0));
        assert_eq!(value(&mf, 1, [8]), Some(-1.0));

        mf.fill_boundary(0, 1, &Periodicity::new(IntVect::new([8]))).unwrap();
        assert_eq!(value(&mf, 0, [-1]), Some(7.0));
        assert_eq!(value(&mf, 1, [8]), Some(0.0));
    }

    #[test]
    fn sum_boundary_is_not_idempotent() {
        let mut mf = line(1);
        let all = Selection::default().with_ghost_all(1);
        mf.set_val(1.0, &all).unwrap();
        mf.sum_boundary(0, 1, &Periodicity::non_periodic()).unwrap();
        assert_eq!(value(&mf, 0, [3]), Some(2.0));
        assert_eq!(value(&mf, 1, [4]), Some(2.0));
        assert_eq!(value(&mf, 0, [0]), Some(1.0));
        assert_eq!(mf.sum(&Selection::default(), true), Ok(10.0));

        mf.sum_boundary(0, 1, &Periodicity::non_periodic()).unwrap();
        assert_eq!(mf.sum(&Selection::default(), true), Ok(12.0));
    }

    #[test]
    fn sum_boundary_can_take_fewer_ghosts() {
        let all = Selection::default().with_ghost_all(2);
        let mut narrow = line(2);
        let mut wide = line(2);
        narrow.set_val(1.0, &all).unwrap();
        wide.set_val(1.0, &all).unwrap();

        narrow.sum_boundary_with_ghost(0, 1, IntVect::splat(1), &Periodicity::non_periodic()).unwrap();
        wide.sum_boundary(0, 1, &Periodicity::non_periodic()).unwrap();
        assert_eq!(value(&narrow, 0, [3]), Some(2.0));
        assert_eq!(value(&narrow, 0, [2]), Some(1.0));
        assert_eq!(value(&wide, 0, [2]), Some(2.0));
        assert_eq!(narrow.sum(&Selection::default(), true), Ok(10.0));
        assert_eq!(wide.sum(&Selection::default(), true), Ok(12.0));

        assert!(matches!(
            narrow.sum_boundary_with_ghost(0, 1, IntVect::splat(3), &Periodicity::non_periodic()),
            Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn override_sync_is_idempotent() {
        let mut mf = nodal_line();
        fill_valid(&mut mf, |i, p| (i + 1) as f64 * 10.0 + p[0] as f64);
        let period = Periodicity::new(IntVect::new([8]));
        mf.override_sync(0, 1, &period).unwrap();
        assert_eq!(value(&mf, 1, [4]), Some(14.0));
        assert_eq!(value(&mf, 0, [4]), Some(14.0));
        assert_eq!(value(&mf, 1, [8]), Some(10.0));
        assert_eq!(value(&mf, 1, [5]), Some(25.0));

        let once: Vec<Vec<f64>> = mf.fabs().iter().map(|f| f.as_slice().to_vec()).collect();
        mf.override_sync(0, 1, &period).unwrap();
        let twice: Vec<Vec<f64>> = mf.fabs().iter().map(|f| f.as_slice().to_vec()).collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn masks_count_shared_points() {
        let mf = nodal_line();
        let owner = mf.owner_mask(&Periodicity::non_periodic()).unwrap();
        let overlap = mf.overlap_mask(&Periodicity::new(IntVect::new([8]))).unwrap();
        assert_eq!(owner.fabs()[0].as_slice(), &[1, 1, 1, 1, 1]);
        assert_eq!(owner.fabs()[1].as_slice(), &[0, 1, 1, 1, 1]);
        assert_eq!(overlap.fabs()[0].as_slice(), &[2.0, 1.0, 1.0, 1.0, 2.0]);
        assert_eq!(overlap.fabs()[1].as_slice(), &[2.0, 1.0, 1.0, 1.0, 2.0]);
    }

    #[test]
    fn parallel_copy_moves_data_between_decompositions() {
        let coarse = serial(BoxArray::from_domain(IndexBox::new([0, 0], [7, 7])), 2, 0);
        let mut fine = serial(BoxArray::from_domain(IndexBox::new([0, 0], [7, 7])).max_size_all(2).unwrap(), 1, 1);
        let mut src = coarse.clone();
        fill_valid(&mut src, |_, p| (p[0] * 8 + p[1]) as f64);

        fine.parallel_copy(&src, &Transfer::new(1, 0, 1), IntVect::zero(), &Periodicity::non_periodic(), CopyOp::Copy).unwrap();
        assert_eq!(value(&fine, 5, [2, 3]), Some(19.0));
        assert_eq!(value(&fine, 5, [2, 4]), Some(0.0));

        fine.parallel_copy(&src, &Transfer::new(1, 0, 1).with_ghost_all(1), IntVect::zero(), &Periodicity::non_periodic(), CopyOp::Add).unwrap();
        assert_eq!(value(&fine, 5, [2, 3]), Some(38.0));
        assert_eq!(value(&fine, 5, [2, 4]), Some(20.0));

        let nodal = serial(BoxArray::from_domain(IndexBox::new([0, 0], [7, 7])).convert(IndexType::node()), 1, 0);
        assert!(matches!(
            fine.parallel_copy(&nodal, &Transfer::default(), IntVect::zero(), &Periodicity::non_periodic(), CopyOp::Copy),
            Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn copy_swap_and_components() {
        let mut a = line(1);
        let mut b = MultiFab::like(&a, 1, IntVect::splat(1)).unwrap();
        a.set_val(1.0, &Selection::default().with_ghost_all(1)).unwrap();
        b.set_val(2.0, &Selection::default()).unwrap();

        MultiFab::swap(&mut a, &mut b, &Transfer::default()).unwrap();
        assert_eq!(value(&a, 0, [0]), Some(2.0));
        assert_eq!(value(&a, 0, [-1]), Some(1.0));
        assert_eq!(value(&b, 1, [7]), Some(1.0));

        let c = FabArray::from_components(&a, 0, 1, IntVect::splat(1)).unwrap();
        assert_eq!(value(&c, 0, [-1]), Some(1.0));
        assert!(FabArray::from_components(&a, 0, 1, IntVect::splat(2)).is_err());
        assert!(FabArray::from_components(&a, 1, 1, IntVect::zero()).is_err());
    }

    #[test]
    fn fill_boundary_crosses_ranks() {
        let results = run_group(3, |comm| {
            let ba = BoxArray::from_domain(IndexBox::new([0, 0], [15, 15])).max_size_all(4).unwrap();
            let dm = DistributionMapping::new(&ba, comm.size(), &RoundRobin).unwrap();
            let mut mf = MultiFab::from_layout(ba, dm, 1, IntVect::splat(1), comm).unwrap();
            fill_valid(&mut mf, |i, _| i as f64);
            mf.fill_boundary(0, 1, &Periodicity::non_periodic()).unwrap();

            let mut ok = true;
            let mut mfi = MFIter::new(&mf).unwrap();
            while mfi.is_valid() {
                let i = mfi.index().unwrap();
                let valid = mfi.valid_box().unwrap();
                let a = mf.const_array(&mfi).unwrap();
                if valid.hi()[1] < 15 {
                    ok &= a[(IntVect::new([valid.lo()[0], valid.hi()[1] + 1]), 0)] == (i + 1) as f64;
                }
                if valid.hi()[0] < 15 {
                    ok &= a[(IntVect::new([valid.hi()[0] + 1, valid.lo()[1]]), 0)] == (i + 4) as f64;
                }
                mfi.advance().unwrap();
            }
            ok
        });
        assert!(results.into_iter().all(|ok| ok));
    }

    #[test]
    fn override_sync_crosses_ranks() {
        let results = run_group(2, |comm| {
            let ba = BoxArray::from_domain(IndexBox::new([0], [7])).max_size_all(4).unwrap().convert(IndexType::node());
            let dm = DistributionMapping::new(&ba, comm.size(), &RoundRobin).unwrap();
            let mut mf = MultiFab::from_layout(ba, dm, 1, IntVect::zero(), comm).unwrap();
            fill_valid(&mut mf, |i, _| i as f64 + 1.0);
            mf.override_sync(0, 1, &Periodicity::non_periodic()).unwrap();
            mf.fabs()[0].as_slice().to_vec()
        });
        assert_eq!(results[0], vec![1.0; 5]);
        assert_eq!(results[1], vec![1.0, 2.0, 2.0, 2.0, 2.0]);
    }
}
