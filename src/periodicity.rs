use crate::index_box::IndexBox;
use crate::int_vect::IntVect;




#[derive(Clone, Copy, Debug, PartialEq, Eq)]

/**
 * Periodic wrapping of an index space. The period on each axis is the number
 * of cells in the periodic domain, or zero if the axis is not periodic.
 */
pub struct Periodicity<const DIM: usize> {
    period: IntVect<DIM>,
}




// ============================================================================
impl<const DIM: usize> Periodicity<DIM> {

    pub fn new(period: IntVect<DIM>) -> Self {
        Self { period: period.map(|p| p.max(0)) }
    }

    pub fn non_periodic() -> Self {
        Self { period: IntVect::zero() }
    }

    /**
     * Periodicity of a domain box on the selected axes. The period is the
     * number of cells the domain encloses, whatever its index type.
     */
    pub fn from_domain(domain: &IndexBox<DIM>, periodic: [bool; DIM]) -> Self {
        let cells = domain.enclosed_cells();
        let mut period = IntVect::zero();

        for d in 0..DIM {
            if periodic[d] {
                period[d] = cells.length(d)
            }
        }
        Self { period }
    }

    pub fn period(&self) -> IntVect<DIM> {
        self.period
    }

    pub fn is_periodic(&self, axis: usize) -> bool {
        self.period[axis] > 0
    }

    pub fn is_any_periodic(&self) -> bool {
        (0..DIM).any(|d| self.is_periodic(d))
    }

    /**
     * Return every periodic image offset to consider when matching boxes:
     * each periodic axis contributes `-p, 0, +p`. The zero shift is always
     * first; the rest follow in row-major order of the offset grid.
     */
    pub fn shifts(&self) -> Vec<IntVect<DIM>> {
        let reach = IntVect::new([1; DIM]).zip_map(&self.period, |one, p| if p > 0 { one } else { 0 });
        let images = IndexBox::new(-reach, reach);
        let mut result = vec![IntVect::zero()];

        result.extend(images.iter().filter(|n| *n != IntVect::zero()).map(|n| n * self.period));
        result
    }
}

impl<const DIM: usize> Default for Periodicity<DIM> {
    fn default() -> Self {
        Self::non_periodic()
    }
}
