use core::convert::TryFrom;
use core::fmt;
use core::ops::{Add, Index, IndexMut, Mul, Neg, Sub};
use serde::{Deserialize, Serialize};




#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "Vec<i64>", try_from = "Vec<i64>")]

/**
 * A statically-sized vector of signed 64-bit indexes, one per axis of a
 * DIM-dimensional index space. Supports elementwise arithmetic; comparison
 * operators are lexicographic, use `all_le` / `all_ge` for the partial order.
 */
pub struct IntVect<const DIM: usize> {
    data: [i64; DIM],
}




// ============================================================================
impl<const DIM: usize> IntVect<DIM> {

    pub const fn new(data: [i64; DIM]) -> Self {
        Self { data }
    }

    pub const fn zero() -> Self {
        Self { data: [0; DIM] }
    }

    pub const fn splat(value: i64) -> Self {
        Self { data: [value; DIM] }
    }

    /**
     * Return the unit vector along the given axis.
     */
    pub fn unit(axis: usize) -> Self {
        let mut data = [0; DIM];
        data[axis] = 1;
        Self { data }
    }

    pub fn as_array(&self) -> &[i64; DIM] {
        &self.data
    }

    pub fn iter(&self) -> impl Iterator<Item = &i64> {
        self.data.iter()
    }

    /**
     * Apply a function to each pair of components.
     */
    pub fn zip_map<F>(&self, other: &Self, f: F) -> Self
    where
        F: Fn(i64, i64) -> i64
    {
        let mut data = self.data;

        for (x, y) in data.iter_mut().zip(other.data.iter()) {
            *x = f(*x, *y)
        }
        Self { data }
    }

    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(i64) -> i64
    {
        let mut data = self.data;

        for x in data.iter_mut() {
            *x = f(*x)
        }
        Self { data }
    }

    pub fn elementwise_min(&self, other: &Self) -> Self {
        self.zip_map(other, i64::min)
    }

    pub fn elementwise_max(&self, other: &Self) -> Self {
        self.zip_map(other, i64::max)
    }

    pub fn all_le(&self, other: &Self) -> bool {
        self.data.iter().zip(other.data.iter()).all(|(a, b)| a <= b)
    }

    pub fn all_ge(&self, other: &Self) -> bool {
        self.data.iter().zip(other.data.iter()).all(|(a, b)| a >= b)
    }

    pub fn is_non_negative(&self) -> bool {
        self.data.iter().all(|&x| x >= 0)
    }

    /**
     * Return the product of the components, the number of points in a box
     * with this extent. Negative components count as zero.
     */
    pub fn product(&self) -> usize {
        self.data.iter().map(|&x| x.max(0) as usize).product()
    }

    /**
     * Divide each component by the corresponding ratio, rounding towards
     * negative infinity.
     */
    pub fn div_floor(&self, ratio: &Self) -> Self {
        self.zip_map(ratio, i64::div_euclid)
    }
}




// ============================================================================
impl<const DIM: usize> Add for IntVect<DIM> {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        self.zip_map(&other, |a, b| a + b)
    }
}

impl<const DIM: usize> Sub for IntVect<DIM> {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        self.zip_map(&other, |a, b| a - b)
    }
}

impl<const DIM: usize> Mul<i64> for IntVect<DIM> {
    type Output = Self;

    fn mul(self, factor: i64) -> Self {
        self.map(|a| a * factor)
    }
}

impl<const DIM: usize> Mul for IntVect<DIM> {
    type Output = Self;

    fn mul(self, other: Self) -> Self {
        self.zip_map(&other, |a, b| a * b)
    }
}

impl<const DIM: usize> Neg for IntVect<DIM> {
    type Output = Self;

    fn neg(self) -> Self {
        self.map(|a| -a)
    }
}

impl<const DIM: usize> Index<usize> for IntVect<DIM> {
    type Output = i64;

    fn index(&self, axis: usize) -> &i64 {
        &self.data[axis]
    }
}

impl<const DIM: usize> IndexMut<usize> for IntVect<DIM> {
    fn index_mut(&mut self, axis: usize) -> &mut i64 {
        &mut self.data[axis]
    }
}

impl<const DIM: usize> Default for IntVect<DIM> {
    fn default() -> Self {
        Self::zero()
    }
}

impl<const DIM: usize> From<[i64; DIM]> for IntVect<DIM> {
    fn from(data: [i64; DIM]) -> Self {
        Self { data }
    }
}

impl<const DIM: usize> From<IntVect<DIM>> for Vec<i64> {
    fn from(v: IntVect<DIM>) -> Self {
        v.data.to_vec()
    }
}

impl<const DIM: usize> TryFrom<Vec<i64>> for IntVect<DIM> {
    type Error = String;

    fn try_from(v: Vec<i64>) -> Result<Self, Self::Error> {
        let len = v.len();
        <[i64; DIM]>::try_from(v)
            .map(Self::new)
            .map_err(|_| format!("expected {} components, got {}", DIM, len))
    }
}

impl<const DIM: usize> fmt::Display for IntVect<DIM> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "(")?;
        for (n, x) in self.data.iter().enumerate() {
            if n > 0 {
                write!(fmt, ",")?;
            }
            write!(fmt, "{}", x)?;
        }
        write!(fmt, ")")
    }
}




#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "Vec<bool>", try_from = "Vec<bool>")]

/**
 * Per-axis centering of a box: cell-centered or node-centered (nodal).
 */
pub struct IndexType<const DIM: usize> {
    nodal: [bool; DIM],
}




// ============================================================================
impl<const DIM: usize> IndexType<DIM> {

    pub const fn new(nodal: [bool; DIM]) -> Self {
        Self { nodal }
    }

    pub const fn cell() -> Self {
        Self { nodal: [false; DIM] }
    }

    pub const fn node() -> Self {
        Self { nodal: [true; DIM] }
    }

    /**
     * Cell-centered on every axis except the given one.
     */
    pub fn face(axis: usize) -> Self {
        let mut nodal = [false; DIM];
        nodal[axis] = true;
        Self { nodal }
    }

    pub fn is_nodal(&self, axis: usize) -> bool {
        self.nodal[axis]
    }

    pub fn is_cell_centered(&self) -> bool {
        self.nodal.iter().all(|n| !n)
    }

    pub fn is_all_nodal(&self) -> bool {
        self.nodal.iter().all(|n| *n)
    }

    pub fn set_nodal(&mut self, axis: usize, nodal: bool) {
        self.nodal[axis] = nodal
    }

    /**
     * Return a vector with 1 on the nodal axes and 0 elsewhere.
     */
    pub fn as_int_vect(&self) -> IntVect<DIM> {
        let mut data = [0; DIM];

        for (x, n) in data.iter_mut().zip(self.nodal.iter()) {
            *x = *n as i64
        }
        IntVect::new(data)
    }
}

impl<const DIM: usize> Default for IndexType<DIM> {
    fn default() -> Self {
        Self::cell()
    }
}

impl<const DIM: usize> From<IndexType<DIM>> for Vec<bool> {
    fn from(t: IndexType<DIM>) -> Self {
        t.nodal.to_vec()
    }
}

impl<const DIM: usize> TryFrom<Vec<bool>> for IndexType<DIM> {
    type Error = String;

    fn try_from(v: Vec<bool>) -> Result<Self, Self::Error> {
        let len = v.len();
        <[bool; DIM]>::try_from(v)
            .map(Self::new)
            .map_err(|_| format!("expected {} axes, got {}", DIM, len))
    }
}
