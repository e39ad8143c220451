use log::error;
use rayon::prelude::*;
use crate::error::{Error, Result};
use crate::fab_array::MultiFab;
use crate::int_vect::IntVect;
use crate::message::ReduceOp;
use crate::periodicity::Periodicity;
use crate::selection::{validate_comps, validate_ghost, Combine, Selection, Transfer};




// ============================================================================
impl<const DIM: usize> MultiFab<DIM> {




    /**
     * Combine a rank-local partial result over all ranks, unless `local` is
     * set, in which case the communicator is not touched.
     */
    fn all_reduce(&self, op: ReduceOp, value: f64, local: bool) -> Result<f64> {
        if local {
            Ok(value)
        } else {
            self.base().communicator()?.all_reduce_f64(op, value)
        }
    }


    fn all_reduce_or(&self, value: bool, local: bool) -> Result<bool> {
        if local {
            Ok(value)
        } else {
            self.base().communicator()?.all_reduce_or(value)
        }
    }


    /**
     * Fold `g(x)` over the selected values with `op`: per fab on the rayon
     * pool, then serially over fabs in local index order, then over ranks.
     */
    fn reduce<G>(&self, selection: &Selection<DIM>, local: bool, op: ReduceOp, g: G) -> Result<f64>
    where
        G: Fn(f64) -> f64 + Sync
    {
        let comps = selection.comp_range();
        let partials = self.map_fabs(selection, |_, fab, region| {
            let mut acc = op.identity();
            fab.for_each_in(region, comps.clone(), |x| acc = op.apply(acc, g(x)));
            acc
        })?;
        let value = partials.into_iter().fold(op.identity(), |a, b| op.apply(a, b));
        self.all_reduce(op, value, local)
    }


    /**
     * Like `reduce` over the valid cells of component `comp`, but counting
     * only the points this box owns, so points shared between boxes (or
     * periodic images) contribute once.
     */
    fn reduce_owned<G>(&self, comp: usize, period: &Periodicity<DIM>, local: bool, op: ReduceOp, g: G) -> Result<f64>
    where
        G: Fn(f64) -> f64 + Sync
    {
        let mask = self.owner_mask(period)?;
        let partials = self.map_fabs(&Selection::comps(comp, 1), |k, fab, region| {
            let owner = &mask.fabs()[k];
            let mut acc = op.identity();

            for index in region.iter() {
                if owner.get(index, 0) == Some(1) {
                    if let Some(x) = fab.get(index, comp) {
                        acc = op.apply(acc, g(x))
                    }
                }
            }
            acc
        })?;
        let value = partials.into_iter().fold(op.identity(), |a, b| op.apply(a, b));
        self.all_reduce(op, value, local)
    }




    /**
     * Minimum over the selection. Infinity if nothing is selected; NaN if
     * any selected value is NaN.
     */
    pub fn min(&self, selection: &Selection<DIM>, local: bool) -> Result<f64> {
        self.reduce(selection, local, ReduceOp::Min, |x| x)
    }


    /**
     * Maximum over the selection. Negative infinity if nothing is selected;
     * NaN if any selected value is NaN.
     */
    pub fn max(&self, selection: &Selection<DIM>, local: bool) -> Result<f64> {
        self.reduce(selection, local, ReduceOp::Max, |x| x)
    }


    pub fn sum(&self, selection: &Selection<DIM>, local: bool) -> Result<f64> {
        self.reduce(selection, local, ReduceOp::Sum, |x| x)
    }


    /**
     * Maximum absolute value.
     */
    pub fn norm0(&self, selection: &Selection<DIM>, local: bool) -> Result<f64> {
        self.reduce(selection, local, ReduceOp::Max, f64::abs)
    }


    pub fn norminf(&self, selection: &Selection<DIM>, local: bool) -> Result<f64> {
        self.norm0(selection, local)
    }


    /**
     * Sum of absolute values.
     */
    pub fn norm1(&self, selection: &Selection<DIM>, local: bool) -> Result<f64> {
        self.reduce(selection, local, ReduceOp::Sum, f64::abs)
    }


    /**
     * Square root of the sum of squares.
     */
    pub fn norm2(&self, selection: &Selection<DIM>, local: bool) -> Result<f64> {
        Ok(self.reduce(selection, local, ReduceOp::Sum, |x| x * x)?.sqrt())
    }


    /**
     * `norm1` of the valid cells of one component, where each point shared
     * between boxes or periodic images is counted once.
     */
    pub fn norm1_periodic(&self, comp: usize, period: &Periodicity<DIM>, local: bool) -> Result<f64> {
        self.reduce_owned(comp, period, local, ReduceOp::Sum, f64::abs)
    }


    pub fn norm2_periodic(&self, comp: usize, period: &Periodicity<DIM>, local: bool) -> Result<f64> {
        Ok(self.reduce_owned(comp, period, local, ReduceOp::Sum, |x| x * x)?.sqrt())
    }


    /**
     * Whether any selected value is NaN.
     */
    pub fn contains_nan(&self, selection: &Selection<DIM>, local: bool) -> Result<bool> {
        let comps = selection.comp_range();
        let found = self.map_fabs(selection, |_, fab, region| {
            let mut found = false;
            fab.for_each_in(region, comps.clone(), |x| found |= x.is_nan());
            found
        })?;
        self.all_reduce_or(found.into_iter().any(|f| f), local)
    }


    /**
     * Whether any selected value is infinite.
     */
    pub fn contains_inf(&self, selection: &Selection<DIM>, local: bool) -> Result<bool> {
        let comps = selection.comp_range();
        let found = self.map_fabs(selection, |_, fab, region| {
            let mut found = false;
            fab.for_each_in(region, comps.clone(), |x| found |= x.is_infinite());
            found
        })?;
        self.all_reduce_or(found.into_iter().any(|f| f), local)
    }


    /**
     * Location of the minimum of component `comp` over the valid cells. NaN
     * values are skipped and ties go to the lexicographically smallest
     * index. `None` if there are no cells or every value is NaN.
     */
    pub fn min_index(&self, comp: usize, local: bool) -> Result<Option<IntVect<DIM>>> {
        self.extremum_index(comp, local, ReduceOp::Min)
    }


    pub fn max_index(&self, comp: usize, local: bool) -> Result<Option<IntVect<DIM>>> {
        self.extremum_index(comp, local, ReduceOp::Max)
    }


    fn extremum_index(&self, comp: usize, local: bool, op: ReduceOp) -> Result<Option<IntVect<DIM>>> {
        let partials = self.map_fabs(&Selection::comps(comp, 1), |_, fab, region| {
            region.iter().fold(None, |best, index| {
                let candidate = fab.get(index, comp).map(|x| (x, index));
                better(op, best, candidate)
            })
        })?;
        let best = partials.into_iter().fold(None, |a, b| better(op, a, b));

        if local {
            return Ok(best.map(|(_, index)| index))
        }
        let none = rmp_serde::encode::to_vec(&None::<(f64, IntVect<DIM>)>).map_err(|e| Error::comm(e.to_string()))?;
        let decode = |bytes: &[u8]| -> Option<(f64, IntVect<DIM>)> {
            rmp_serde::decode::from_slice(bytes).unwrap_or_else(|e| {
                error!("dropping undecodable extremum candidate: {}", e);
                None
            })
        };
        let pick = |a: Vec<u8>, b: Vec<u8>| {
            rmp_serde::encode::to_vec(&better(op, decode(&a), decode(&b))).unwrap_or_else(|e| {
                error!("could not encode extremum candidate: {}", e);
                none.clone()
            })
        };
        let bytes = rmp_serde::encode::to_vec(&best).map_err(|e| Error::comm(e.to_string()))?;
        let bytes = self.base().communicator()?.all_reduce(&pick, bytes)?;
        let best: Option<(f64, IntVect<DIM>)> = rmp_serde::decode::from_slice(&bytes).map_err(|e| Error::comm(e.to_string()))?;
        Ok(best.map(|(_, index)| index))
    }


    /**
     * Sum over the valid regions (grown by `ghost`) of `x[x_comp + n] *
     * y[y_comp + n]` for `n < num_comp`.
     */
    #[allow(clippy::too_many_arguments)]
    pub fn dot(
        x: &Self,
        x_comp: usize,
        y: &Self,
        y_comp: usize,
        num_comp: usize,
        ghost: IntVect<DIM>,
        local: bool) -> Result<f64>
    {
        x.base().check_compatible(y.base())?;
        validate_comps(x_comp, num_comp, x.n_comp()?)?;
        validate_comps(y_comp, num_comp, y.n_comp()?)?;
        validate_ghost(ghost, y.n_grow_vect()?)?;

        let partials = x.map_fabs(&Selection::comps(x_comp, num_comp).with_ghost(ghost), |k, fab, region| {
            let other = &y.fabs()[k];
            let mut acc = 0.0;

            for index in region.iter() {
                let i = fab.offset(index, x_comp);
                let j = other.offset(index, y_comp);
                for n in 0..num_comp {
                    acc += fab.as_slice()[i + n] * other.as_slice()[j + n]
                }
            }
            acc
        })?;
        x.all_reduce(ReduceOp::Sum, partials.into_iter().sum(), local)
    }




    /**
     * Add a scalar to every selected value.
     */
    pub fn plus(&mut self, value: f64, selection: &Selection<DIM>) -> Result<()> {
        self.apply(selection, |x| *x += value)
    }


    pub fn minus(&mut self, value: f64, selection: &Selection<DIM>) -> Result<()> {
        self.apply(selection, |x| *x -= value)
    }


    /**
     * Multiply every selected value by a scalar.
     */
    pub fn mult(&mut self, value: f64, selection: &Selection<DIM>) -> Result<()> {
        self.apply(selection, |x| *x *= value)
    }


    pub fn divide(&mut self, value: f64, selection: &Selection<DIM>) -> Result<()> {
        self.apply(selection, |x| *x /= value)
    }


    /**
     * Replace every selected value `x` with `numerator / x`.
     */
    pub fn invert(&mut self, numerator: f64, selection: &Selection<DIM>) -> Result<()> {
        self.apply(selection, |x| *x = numerator / *x)
    }


    pub fn negate(&mut self, selection: &Selection<DIM>) -> Result<()> {
        self.apply(selection, |x| *x = -*x)
    }


    pub fn abs(&mut self, selection: &Selection<DIM>) -> Result<()> {
        self.apply(selection, |x| *x = x.abs())
    }


    /**
     * `self += src`, over the components and ghost width of `transfer`.
     */
    pub fn plus_from(&mut self, src: &Self, transfer: &Transfer<DIM>) -> Result<()> {
        Self::add(self, src, transfer)
    }


    pub fn minus_from(&mut self, src: &Self, transfer: &Transfer<DIM>) -> Result<()> {
        Self::subtract(self, src, transfer)
    }


    pub fn mult_from(&mut self, src: &Self, transfer: &Transfer<DIM>) -> Result<()> {
        Self::multiply(self, src, transfer)
    }


    pub fn divide_from(&mut self, src: &Self, transfer: &Transfer<DIM>) -> Result<()> {
        Self::divide_by(self, src, transfer)
    }




    /**
     * `dst += src`
     */
    pub fn add(dst: &mut Self, src: &Self, transfer: &Transfer<DIM>) -> Result<()> {
        Self::zip_apply(dst, src, transfer, |y, x| *y += x)
    }


    /**
     * `dst -= src`
     */
    pub fn subtract(dst: &mut Self, src: &Self, transfer: &Transfer<DIM>) -> Result<()> {
        Self::zip_apply(dst, src, transfer, |y, x| *y -= x)
    }


    /**
     * `dst *= src`
     */
    pub fn multiply(dst: &mut Self, src: &Self, transfer: &Transfer<DIM>) -> Result<()> {
        Self::zip_apply(dst, src, transfer, |y, x| *y *= x)
    }


    /**
     * `dst /= src`
     */
    pub fn divide_by(dst: &mut Self, src: &Self, transfer: &Transfer<DIM>) -> Result<()> {
        Self::zip_apply(dst, src, transfer, |y, x| *y /= x)
    }


    /**
     * `dst += a * src`
     */
    pub fn saxpy(dst: &mut Self, a: f64, src: &Self, transfer: &Transfer<DIM>) -> Result<()> {
        Self::zip_apply(dst, src, transfer, |y, x| *y += a * x)
    }


    /**
     * `dst = src + a * dst`
     */
    pub fn xpay(dst: &mut Self, a: f64, src: &Self, transfer: &Transfer<DIM>) -> Result<()> {
        Self::zip_apply(dst, src, transfer, |y, x| *y = x + a * *y)
    }


    /**
     * `dst = a * x + b * y`
     */
    pub fn lin_comb(dst: &mut Self, a: f64, x: &Self, b: f64, y: &Self, combine: &Combine<DIM>) -> Result<()> {
        Self::zip2_apply(dst, x, y, combine, |d, xv, yv| *d = a * xv + b * yv)
    }


    /**
     * `dst += x * y`
     */
    pub fn add_product(dst: &mut Self, x: &Self, y: &Self, combine: &Combine<DIM>) -> Result<()> {
        Self::zip2_apply(dst, x, y, combine, |d, xv, yv| *d += xv * yv)
    }




    /**
     * Replace every copy of a shared point with the average over all its
     * copies.
     */
    pub fn average_sync(&mut self, period: &Periodicity<DIM>) -> Result<()> {
        let mut weights = self.overlap_mask(period)?;
        weights.invert(1.0, &Selection::default())?;
        self.weighted_sync(&weights, period)
    }


    /**
     * Scale each valid value by the (single-component) weight at its point,
     * then replace every copy of a shared point with the sum of the scaled
     * copies.
     */
    pub fn weighted_sync(&mut self, weights: &Self, period: &Periodicity<DIM>) -> Result<()> {
        let ncomp = self.n_comp()?;

        for comp in 0..ncomp {
            Self::multiply(self, weights, &Transfer::new(0, comp, 1))?
        }
        self.sum_into_valid(0, ncomp, IntVect::zero(), period)
    }


    /**
     * The number of values this rank holds, ghosts included.
     */
    pub fn local_len(&self) -> usize {
        self.fabs().par_iter().map(|fab| fab.len()).sum()
    }
}

fn better<const DIM: usize>(
    op: ReduceOp,
    a: Option<(f64, IntVect<DIM>)>,
    b: Option<(f64, IntVect<DIM>)>) -> Option<(f64, IntVect<DIM>)>
{
    match (a, b) {
        (Some(a), Some(b)) => {
            let b_wins = match op {
                ReduceOp::Min => b.0 < a.0,
                ReduceOp::Max | ReduceOp::Sum => b.0 > a.0,
            };
            if b_wins || (b.0 == a.0 && b.1 < a.1) { Some(b) } else { Some(a) }
        }
        (Some(a), None) => Some(a).filter(|a| !a.0.is_nan()),
        (None, b) => b.filter(|b| !b.0.is_nan()),
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use std::sync::Arc;
    use std::time::Duration;
    use crate::box_array::BoxArray;
    use crate::distribution_mapping::{DistributionMapping, RoundRobin};
    use crate::error::Error;
    use crate::fab_array::MultiFab;
    use crate::index_box::IndexBox;
    use crate::int_vect::{IndexType, IntVect};
    use crate::message::{ChannelCommunicator, Communicator, SerialCommunicator};
    use crate::mf_iter::MFIter;
    use crate::periodicity::Periodicity;
    use crate::selection::{Combine, Selection, Transfer};

    fn serial<const DIM: usize>(ba: BoxArray<DIM>, ncomp: usize, ngrow: i64) -> MultiFab<DIM> {
        let dm = DistributionMapping::single_rank(&ba);
        MultiFab::from_layout(ba, dm, ncomp, IntVect::splat(ngrow), Arc::new(SerialCommunicator)).unwrap()
    }

    fn fill<const DIM: usize, F>(mf: &mut MultiFab<DIM>, f: F)
    where
        F: Fn(IntVect<DIM>, usize) -> f64
    {
        let mut mfi = MFIter::new(&*mf).unwrap();

        while mfi.is_valid() {
            let fab_box = mfi.fab_box().unwrap();
            let mut a = mf.array(&mfi).unwrap();
            for p in fab_box.iter() {
                for n in 0..a.ncomp() {
                    a[(p, n)] = f(p, n)
                }
            }
            mfi.advance().unwrap();
        }
    }

    fn square() -> BoxArray<2> {
        BoxArray::from_domain(IndexBox::new([0, 0], [7, 7])).max_size_all(4).unwrap()
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
    fn four_unit_boxes_sum_to_twenty() {
        let ba = BoxArray::from_boxes(vec![
            IndexBox::new([0, 0], [0, 0]),
            IndexBox::new([0, 1], [0, 1]),
            IndexBox::new([1, 0], [1, 0]),
            IndexBox::new([1, 1], [1, 1]),
        ]).unwrap();
        let mut mf = serial(ba, 1, 1);
        mf.set_val(5.0, &Selection::default().with_ghost_all(1)).unwrap();

        let mut mfi = MFIter::new(&mf).unwrap();
        let mut count = 0;

        while mfi.is_valid() {
            assert_eq!(mfi.valid_box().unwrap().extent(), IntVect::new([1, 1]));
            assert_eq!(mfi.fab_box().unwrap().extent(), IntVect::new([3, 3]));
            assert_eq!(mfi.grown_tilebox(None).unwrap().extent(), IntVect::new([3, 3]));
            assert_eq!(mfi.tilebox(), mfi.valid_box());
            count += 1;
            mfi.advance().unwrap();
        }
        assert_eq!(count, 4);
        assert_eq!(mf.sum(&Selection::default(), false), Ok(20.0));
        assert_eq!(mf.sum(&Selection::default().with_ghost_all(1), true), Ok(180.0));
    }

    #[test]
    fn add_combines_two_arrays() {
        let mut a = serial(square(), 1, 0);
        let mut b = MultiFab::like(&a, 1, IntVect::zero()).unwrap();
        a.set_val(2.0, &Selection::default()).unwrap();
        b.set_val(3.5, &Selection::default()).unwrap();

        MultiFab::add(&mut a, &b, &Transfer::default()).unwrap();
        assert_eq!(a.min(&Selection::default(), true), Ok(5.5));
        assert_eq!(a.max(&Selection::default(), true), Ok(5.5));
    }

    #[test]
    fn add_rejects_incompatible_layouts() {
        let mut a = serial(square(), 1, 0);
        let b = serial(BoxArray::from_domain(IndexBox::new([0, 0], [7, 7])).max_size_all(2).unwrap(), 1, 0);
        assert_eq!(MultiFab::add(&mut a, &b, &Transfer::default()), Err(Error::IncompatibleLayout));
        assert_eq!(MultiFab::dot(&a, 0, &b, 0, 1, IntVect::zero(), true), Err(Error::IncompatibleLayout));
    }

    #[test]
    fn arrays_over_equal_but_distinct_box_arrays_are_compatible() {
        let mut a = serial(square(), 1, 0);
        let b = serial(square(), 1, 0);
        assert_eq!(MultiFab::subtract(&mut a, &b, &Transfer::default()), Ok(()));
    }

    #[test]
    fn reductions_work() {
        let ba = BoxArray::from_domain(IndexBox::new([0, 0], [3, 3]));
        let mut mf = serial(ba, 2, 1);
        fill(&mut mf, |p, n| if n == 0 { (4 * p[0] + p[1] - 5) as f64 } else { 100.0 });

        let s = Selection::default();
        assert_eq!(mf.min(&s, true), Ok(-5.0));
        assert_eq!(mf.max(&s, true), Ok(10.0));
        assert_eq!(mf.min(&s.with_ghost_all(1), true), Ok(-10.0));
        assert_eq!(mf.sum(&s, true), Ok(40.0));
        assert_eq!(mf.sum(&s.within(IndexBox::new([2, 2], [5, 5])), true), Ok(30.0));
        assert_eq!(mf.norm0(&s, true), Ok(10.0));
        assert_eq!(mf.norminf(&s, true), Ok(10.0));
        assert_eq!(mf.norm1(&s, true), Ok(70.0));
        assert_eq!(mf.norm2(&Selection::comps(1, 1), true), Ok(400.0));
        assert_eq!(mf.min(&Selection::comps(0, 2), true), Ok(-5.0));
        assert_eq!(mf.min_index(0, true), Ok(Some(IntVect::new([0, 0]))));
        assert_eq!(mf.max_index(0, true), Ok(Some(IntVect::new([3, 3]))));
        assert!(matches!(mf.sum(&Selection::comps(1, 2), true), Err(Error::IndexOutOfRange { .. })));
        assert!(matches!(mf.sum(&s.with_ghost_all(2), true), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn empty_selection_gives_identity() {
        let mf = serial(square(), 1, 0);
        let s = Selection::default().within(IndexBox::new([20, 20], [30, 30]));
        assert_eq!(mf.sum(&s, true), Ok(0.0));
        assert_eq!(mf.min(&s, true), Ok(f64::INFINITY));
        assert_eq!(mf.max(&s, true), Ok(f64::NEG_INFINITY));
    }

    #[test]
    fn contains_nan_scans_only_the_selection() {
        let mut mf = serial(square(), 2, 1);
        mf.set_val(1.0, &Selection::comps(0, 2).with_ghost_all(1)).unwrap();
        assert_eq!(mf.contains_nan(&Selection::comps(0, 1), true), Ok(false));
        assert_eq!(mf.contains_nan(&Selection::comps(0, 2).with_ghost_all(1), true), Ok(false));
        assert_eq!(mf.contains_inf(&Selection::comps(1, 1), true), Ok(false));

        *mf.get_mut(3).unwrap().unwrap().get_mut(IntVect::new([8, 8]), 1).unwrap() = f64::NAN;
        assert_eq!(mf.contains_nan(&Selection::comps(1, 1), true), Ok(false));
        assert_eq!(mf.contains_nan(&Selection::comps(1, 1).with_ghost_all(1), true), Ok(true));
        assert_eq!(mf.contains_nan(&Selection::comps(0, 1).with_ghost_all(1), true), Ok(false));

        *mf.get_mut(0).unwrap().unwrap().get_mut(IntVect::new([1, 2]), 0).unwrap() = f64::NAN;
        assert_eq!(mf.contains_nan(&Selection::default(), false), Ok(true));
        assert!(mf.max(&Selection::default(), true).unwrap().is_nan());
        assert!(mf.sum(&Selection::default(), true).unwrap().is_nan());
        assert_eq!(mf.max_index(0, true), Ok(Some(IntVect::new([0, 0]))));

        mf.divide(0.0, &Selection::comps(1, 1)).unwrap();
        assert_eq!(mf.contains_inf(&Selection::comps(1, 1), true), Ok(true));
    }

    #[test]
    fn scalar_updates_work() {
        let mut mf = serial(square(), 1, 1);
        let s = Selection::default();
        mf.set_val(4.0, &s.with_ghost_all(1)).unwrap();
        mf.plus(1.0, &s).unwrap();
        mf.mult(2.0, &s).unwrap();
        mf.minus(2.0, &s).unwrap();
        assert_eq!(mf.min(&s, true), Ok(8.0));
        mf.invert(1.0, &s).unwrap();
        mf.negate(&s).unwrap();
        assert_eq!(mf.max(&s, true), Ok(-0.125));
        mf.abs(&s).unwrap();
        assert_eq!(mf.sum(&s, true), Ok(8.0));
        assert_eq!(mf.max(&s.with_ghost_all(1), true), Ok(4.0));
    }

    #[test]
    fn binary_and_ternary_operations_work() {
        let mut x = serial(square(), 1, 0);
        let mut y = MultiFab::like(&x, 1, IntVect::zero()).unwrap();
        let mut z = MultiFab::like(&x, 1, IntVect::zero()).unwrap();
        let s = Selection::default();
        x.set_val(2.0, &s).unwrap();
        y.set_val(3.0, &s).unwrap();

        assert_eq!(MultiFab::dot(&x, 0, &y, 0, 1, IntVect::zero(), true), Ok(384.0));
        MultiFab::saxpy(&mut y, 2.0, &x, &Transfer::default()).unwrap();
        assert_eq!(y.max(&s, true), Ok(7.0));
        MultiFab::xpay(&mut y, 0.5, &x, &Transfer::default()).unwrap();
        assert_eq!(y.max(&s, true), Ok(5.5));
        MultiFab::lin_comb(&mut z, 2.0, &x, 3.0, &y, &Combine::default()).unwrap();
        assert_eq!(z.min(&s, true), Ok(20.5));
        MultiFab::add_product(&mut z, &x, &y, &Combine::default()).unwrap();
        assert_eq!(z.min(&s, true), Ok(31.5));
        z.divide_from(&x, &Transfer::default()).unwrap();
        z.mult_from(&y, &Transfer::default()).unwrap();
        z.minus_from(&x, &Transfer::default()).unwrap();
        z.plus_from(&y, &Transfer::default()).unwrap();
        assert_eq!(z.max(&s, true), Ok(31.5 / 2.0 * 5.5 - 2.0 + 5.5));
        assert!(MultiFab::multiply(&mut z, &x, &Transfer::new(0, 1, 1)).is_err());
    }

    #[test]
    fn nodal_syncs_and_periodic_norms() {
        let ba = BoxArray::from_domain(IndexBox::new([0], [7])).max_size_all(4).unwrap().convert(IndexType::node());
        let mut mf = serial(ba, 1, 0);
        fill(&mut mf, |p, _| if p[0] <= 4 { 1.0 } else { 2.0 });
        *mf.get_mut(1).unwrap().unwrap().get_mut(IntVect::new([4]), 0).unwrap() = 2.0;

        let none = Periodicity::non_periodic();
        assert_eq!(mf.norm1(&Selection::default(), true), Ok(15.0));
        assert_eq!(mf.norm1_periodic(0, &none, true), Ok(13.0));
        assert_eq!(mf.norm2_periodic(0, &none, true), Ok(21.0f64.sqrt()));

        mf.average_sync(&none).unwrap();
        assert_eq!(mf.fabs()[0].as_slice(), &[1.0, 1.0, 1.0, 1.0, 1.5]);
        assert_eq!(mf.fabs()[1].as_slice(), &[1.5, 2.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn sub_box_of_another_index_type_is_rejected() {
        let ba = BoxArray::from_domain(IndexBox::new([0, 0], [3, 3])).convert(IndexType::node());
        let mut mf = serial(ba, 1, 0);
        mf.set_val(1.0, &Selection::default()).unwrap();

        let cells = Selection::default().within(IndexBox::new([0, 0], [3, 3]));
        assert!(matches!(mf.sum(&cells, true), Err(Error::InvalidArgument(_))));
        assert!(matches!(mf.plus(5.0, &cells), Err(Error::InvalidArgument(_))));
        assert_eq!(mf.max(&Selection::default(), true), Ok(1.0));

        let nodes = Selection::default().within(IndexBox::with_type([0, 0], [3, 3], IndexType::node()));
        assert_eq!(mf.sum(&nodes, true), Ok(16.0));
    }

    #[test]
    fn local_reductions_never_communicate() {
        let ba = BoxArray::from_boxes(vec![
            IndexBox::new([0, 0], [3, 3]),
            IndexBox::new([4, 4], [5, 5]),
        ]).unwrap();
        let dm = DistributionMapping::from_ranks(vec![0, 1]);
        let none = Periodicity::non_periodic();
        let s = Selection::default();

        for comm in ChannelCommunicator::group(2) {
            let rank = comm.rank();
            let comm: Arc<dyn Communicator> = Arc::new(comm.with_timeout(Duration::from_millis(20)));
            let mut mf = MultiFab::from_layout(ba.clone(), dm.clone(), 1, IntVect::splat(1), comm).unwrap();
            mf.set_val(2.0, &s).unwrap();
            let cells = if rank == 0 { 16.0 } else { 4.0 };

            assert_eq!(mf.min(&s, true), Ok(2.0));
            assert_eq!(mf.max(&s, true), Ok(2.0));
            assert_eq!(mf.sum(&s, true), Ok(2.0 * cells));
            assert_eq!(mf.norm0(&s, true), Ok(2.0));
            assert_eq!(mf.norminf(&s, true), Ok(2.0));
            assert_eq!(mf.norm1(&s, true), Ok(2.0 * cells));
            assert_eq!(mf.norm2(&s, true), Ok((4.0 * cells).sqrt()));
            assert_eq!(mf.norm1_periodic(0, &none, true), Ok(2.0 * cells));
            assert!(mf.norm2_periodic(0, &none, true).is_ok());
            assert_eq!(mf.contains_nan(&s.with_ghost_all(1), true), Ok(false));
            assert_eq!(mf.contains_inf(&s, true), Ok(false));
            assert!(mf.min_index(0, true).unwrap().is_some());
            assert!(mf.max_index(0, true).unwrap().is_some());
            assert_eq!(MultiFab::dot(&mf, 0, &mf, 0, 1, IntVect::zero(), true), Ok(4.0 * cells));

            if rank == 0 {
                assert!(matches!(mf.sum(&s, false), Err(Error::CommunicationFailure(_))));
            }
        }
    }

    #[test]
    fn reductions_combine_over_ranks() {
        let results = run_group(3, |comm| {
            let rank = comm.rank();
            let ba = BoxArray::from_domain(IndexBox::new([0, 0], [15, 15])).max_size_all(4).unwrap();
            let dm = DistributionMapping::new(&ba, comm.size(), &RoundRobin).unwrap();
            let mut mf = MultiFab::from_layout(ba, dm, 1, IntVect::splat(1), comm).unwrap();
            mf.set_val(1.0 + rank as f64, &Selection::default()).unwrap();
            let local = mf.sum(&Selection::default(), true).unwrap();
            let global = mf.sum(&Selection::default(), false).unwrap();
            let max = mf.max(&Selection::default(), false).unwrap();

            fill(&mut mf, |p, _| ((p[0] - 9) * (p[0] - 9) + (p[1] - 5) * (p[1] - 5)) as f64);
            let at = mf.min_index(0, false).unwrap();
            (local, global, max, at)
        });
        assert_eq!(results[0].0, 96.0);
        assert_eq!(results[1].0, 160.0);
        assert_eq!(results[2].0, 240.0);
        assert!(results.iter().all(|r| r.1 == 496.0 && r.2 == 3.0));
        assert!(results.iter().all(|r| r.3 == Some(IntVect::new([9, 5]))));
    }
}
