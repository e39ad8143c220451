use core::ops::Range;
use crate::error::{Error, Result};
use crate::index_box::IndexBox;
use crate::int_vect::{IndexType, IntVect};




/**
 * Which part of a fab array a unary operation (a reduction, a scalar
 * update, a NaN scan) applies to.
 *
 * The defaults are the first component only, valid cells only (no ghosts),
 * and no sub-box restriction. With `sub_box` set, each fab's region is
 * further intersected with it.
 */
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Selection<const DIM: usize> {
    pub comp: usize,
    pub num_comp: usize,
    pub ghost: IntVect<DIM>,
    pub sub_box: Option<IndexBox<DIM>>,
}

impl<const DIM: usize> Default for Selection<DIM> {
    fn default() -> Self {
        Self { comp: 0, num_comp: 1, ghost: IntVect::zero(), sub_box: None }
    }
}

impl<const DIM: usize> Selection<DIM> {

    /**
     * Select `num_comp` components starting from `comp`.
     */
    pub fn comps(comp: usize, num_comp: usize) -> Self {
        Self { comp, num_comp, ..Self::default() }
    }

    pub fn with_ghost(mut self, ghost: IntVect<DIM>) -> Self {
        self.ghost = ghost;
        self
    }

    pub fn with_ghost_all(self, ghost: i64) -> Self {
        self.with_ghost(IntVect::splat(ghost))
    }

    pub fn within(mut self, sub_box: IndexBox<DIM>) -> Self {
        self.sub_box = Some(sub_box);
        self
    }

    pub fn comp_range(&self) -> Range<usize> {
        self.comp..self.comp + self.num_comp
    }

    /**
     * The region of box `valid` this selection covers: the box grown by the
     * ghost width, clipped to the sub-box. `None` if nothing is left.
     */
    pub fn region(&self, valid: &IndexBox<DIM>) -> Option<IndexBox<DIM>> {
        let grown = valid.grow(self.ghost);

        match &self.sub_box {
            Some(sub_box) => grown.intersect(sub_box),
            None => Some(grown).filter(|b| !b.is_empty()),
        }
    }

    /**
     * Check the selection against an array with `ncomp` components, ghost
     * width `ngrow` and boxes of type `ix_type`. A sub-box of another index
     * type is rejected rather than treated as selecting nothing.
     */
    pub(crate) fn validate(&self, ncomp: usize, ngrow: IntVect<DIM>, ix_type: IndexType<DIM>) -> Result<()> {
        validate_comps(self.comp, self.num_comp, ncomp)?;
        validate_ghost(self.ghost, ngrow)?;

        match &self.sub_box {
            Some(sub_box) if sub_box.ix_type() != ix_type => Err(Error::invalid(format!(
                "sub-box {} has index type {} but the array has {}",
                sub_box, sub_box.ix_type().as_int_vect(), ix_type.as_int_vect()))),
            _ => Ok(()),
        }
    }
}




/**
 * Parameters of a binary operation between two fab arrays: `num_comp`
 * components starting at `src_comp` of the source are combined into the
 * components starting at `dst_comp` of the destination, over the valid
 * region grown by `ghost`.
 */
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transfer<const DIM: usize> {
    pub src_comp: usize,
    pub dst_comp: usize,
    pub num_comp: usize,
    pub ghost: IntVect<DIM>,
}

impl<const DIM: usize> Default for Transfer<DIM> {
    fn default() -> Self {
        Self { src_comp: 0, dst_comp: 0, num_comp: 1, ghost: IntVect::zero() }
    }
}

impl<const DIM: usize> Transfer<DIM> {

    pub fn new(src_comp: usize, dst_comp: usize, num_comp: usize) -> Self {
        Self { src_comp, dst_comp, num_comp, ghost: IntVect::zero() }
    }

    /**
     * The same component range on both sides.
     */
    pub fn comps(comp: usize, num_comp: usize) -> Self {
        Self::new(comp, comp, num_comp)
    }

    pub fn with_ghost(mut self, ghost: IntVect<DIM>) -> Self {
        self.ghost = ghost;
        self
    }

    pub fn with_ghost_all(self, ghost: i64) -> Self {
        self.with_ghost(IntVect::splat(ghost))
    }
}




/**
 * Parameters of a ternary operation `dst = f(x, y)`: `num_comp` components
 * starting at `x_comp`, `y_comp` and `dst_comp` respectively, over the
 * valid region grown by `ghost`.
 */
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Combine<const DIM: usize> {
    pub x_comp: usize,
    pub y_comp: usize,
    pub dst_comp: usize,
    pub num_comp: usize,
    pub ghost: IntVect<DIM>,
}

impl<const DIM: usize> Default for Combine<DIM> {
    fn default() -> Self {
        Self { x_comp: 0, y_comp: 0, dst_comp: 0, num_comp: 1, ghost: IntVect::zero() }
    }
}

impl<const DIM: usize> Combine<DIM> {

    pub fn new(x_comp: usize, y_comp: usize, dst_comp: usize, num_comp: usize) -> Self {
        Self { x_comp, y_comp, dst_comp, num_comp, ghost: IntVect::zero() }
    }

    pub fn comps(comp: usize, num_comp: usize) -> Self {
        Self::new(comp, comp, comp, num_comp)
    }

    pub fn with_ghost(mut self, ghost: IntVect<DIM>) -> Self {
        self.ghost = ghost;
        self
    }
}




// ============================================================================
pub(crate) fn validate_comps(comp: usize, num_comp: usize, ncomp: usize) -> Result<()> {
    if num_comp == 0 {
        Err(Error::invalid("component count must be positive"))
    } else if comp + num_comp > ncomp {
        Err(Error::out_of_range("component", comp + num_comp - 1, ncomp))
    } else {
        Ok(())
    }
}

pub(crate) fn validate_ghost<const DIM: usize>(ghost: IntVect<DIM>, ngrow: IntVect<DIM>) -> Result<()> {
    if !ghost.is_non_negative() {
        Err(Error::invalid(format!("ghost width {} has a negative component", ghost)))
    } else if !ghost.all_le(&ngrow) {
        Err(Error::invalid(format!("ghost width {} exceeds the allocated width {}", ghost, ngrow)))
    } else {
        Ok(())
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use crate::error::Error;
    use crate::index_box::IndexBox;
    use crate::int_vect::{IndexType, IntVect};
    use super::{validate_comps, Selection};

    #[test]
    fn default_selection_is_first_component_of_valid_cells() {
        let s = Selection::<2>::default();
        assert_eq!(s.comp_range(), 0..1);
        assert_eq!(s.region(&IndexBox::new([0, 0], [3, 3])), Some(IndexBox::new([0, 0], [3, 3])));
    }

    #[test]
    fn selection_region_clips_to_sub_box() {
        let s = Selection::<2>::comps(1, 2).with_ghost_all(1).within(IndexBox::new([-4, 2], [1, 9]));
        assert_eq!(s.region(&IndexBox::new([0, 0], [3, 3])), Some(IndexBox::new([-1, 2], [1, 4])));
        assert_eq!(s.region(&IndexBox::new([10, 10], [12, 12])), None);
    }

    #[test]
    fn selections_are_validated() {
        assert!(validate_comps(1, 2, 3).is_ok());
        assert!(matches!(validate_comps(2, 2, 3), Err(Error::IndexOutOfRange { .. })));
        assert!(matches!(validate_comps(0, 0, 3), Err(Error::InvalidArgument(_))));
        assert!(Selection::<2>::default().with_ghost_all(2).validate(1, IntVect::splat(1), IndexType::cell()).is_err());
    }

    #[test]
    fn sub_box_must_match_the_index_type() {
        let cells = Selection::<2>::default().within(IndexBox::new([0, 0], [3, 3]));
        assert!(cells.validate(1, IntVect::zero(), IndexType::cell()).is_ok());
        assert!(matches!(cells.validate(1, IntVect::zero(), IndexType::node()), Err(Error::InvalidArgument(_))));
    }
}
