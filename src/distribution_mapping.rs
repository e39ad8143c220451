use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use crate::box_array::BoxArray;
use crate::error::{Error, Result};




static NEXT_DISTRIBUTION_ID: AtomicU64 = AtomicU64::new(1);




/// An algorithm that assigns each box of a `BoxArray` to a rank. Strategies
/// must be deterministic: every rank computes the mapping independently and
/// all of them have to agree.
///
pub trait DistributionStrategy {
    /// Must be implemented to return one rank id per box, in box order.
    fn assign<const DIM: usize>(&self, box_array: &BoxArray<DIM>, num_ranks: usize) -> Result<Vec<usize>>;
}




/// Box `i` goes to rank `i % num_ranks`.
///
#[derive(Clone, Copy, Debug, Default)]
pub struct RoundRobin;

impl DistributionStrategy for RoundRobin {
    fn assign<const DIM: usize>(&self, box_array: &BoxArray<DIM>, num_ranks: usize) -> Result<Vec<usize>> {
        Ok((0..box_array.len()).map(|i| i % num_ranks).collect())
    }
}




/// Greedy load balancing by cell count: boxes are taken largest first (ties
/// by position) and each goes to the least loaded rank so far (ties to the
/// lowest rank).
///
#[derive(Clone, Copy, Debug, Default)]
pub struct Knapsack;

impl DistributionStrategy for Knapsack {
    fn assign<const DIM: usize>(&self, box_array: &BoxArray<DIM>, num_ranks: usize) -> Result<Vec<usize>> {
        let mut order: Vec<usize> = (0..box_array.len()).collect();
        let mut load = vec![0usize; num_ranks];
        let mut ranks = vec![0; box_array.len()];

        order.sort_by_key(|&i| core::cmp::Reverse(box_array.boxes()[i].num_pts()));

        for i in order {
            let (rank, _) = load
                .iter()
                .enumerate()
                .min_by_key(|(r, l)| (**l, *r))
                .ok_or_else(|| Error::invalid("distribution over zero ranks"))?;
            load[rank] += box_array.boxes()[i].num_pts();
            ranks[i] = rank;
        }
        Ok(ranks)
    }
}




/// Orders boxes along a Morton (Z-order) curve through their lower corners,
/// then cuts the curve into contiguous pieces of roughly equal cell count,
/// one per rank. Neighboring boxes tend to land on the same rank.
///
#[derive(Clone, Copy, Debug, Default)]
pub struct SpaceFillingCurve;

impl SpaceFillingCurve {
    fn morton_key<const DIM: usize>(offset: [u64; DIM]) -> u128 {
        let bits = 128 / DIM.max(1) as u32;
        let mut key = 0u128;

        for bit in (0..bits.min(64)).rev() {
            for x in offset.iter() {
                key = (key << 1) | ((x >> bit) & 1) as u128;
            }
        }
        key
    }
}

impl DistributionStrategy for SpaceFillingCurve {
    fn assign<const DIM: usize>(&self, box_array: &BoxArray<DIM>, num_ranks: usize) -> Result<Vec<usize>> {
        let origin = match box_array.minimal_box() {
            Some(b) => b.lo(),
            None => return Ok(vec![]),
        };
        let keys: Vec<u128> = box_array
            .iter()
            .map(|b| {
                let mut offset = [0u64; DIM];
                for d in 0..DIM {
                    offset[d] = (b.lo()[d] - origin[d]) as u64;
                }
                Self::morton_key(offset)
            })
            .collect();

        let mut order: Vec<usize> = (0..box_array.len()).collect();
        order.sort_by_key(|&i| (keys[i], i));

        let total: usize = box_array.num_pts().max(1);
        let mut ranks = vec![0; box_array.len()];
        let mut before = 0;

        for i in order {
            ranks[i] = (before * num_ranks / total).min(num_ranks - 1);
            before += box_array.boxes()[i].num_pts();
        }
        Ok(ranks)
    }
}




/// An explicit, caller-supplied list of ranks.
///
#[derive(Clone, Debug, Default)]
pub struct Explicit(pub Vec<usize>);

impl DistributionStrategy for Explicit {
    fn assign<const DIM: usize>(&self, box_array: &BoxArray<DIM>, _num_ranks: usize) -> Result<Vec<usize>> {
        if self.0.len() != box_array.len() {
            return Err(Error::invalid(format!(
                "explicit mapping has {} entries for {} boxes", self.0.len(), box_array.len())))
        }
        Ok(self.0.clone())
    }
}




struct DistributionData {
    id: u64,
    ranks: Vec<usize>,
}




/**
 * Assignment of each box in a box array to the rank that owns it. Like
 * `BoxArray`, a mapping is immutable and shared between clones, carries an
 * identity tag, and compares structurally with `==`.
 */
#[derive(Clone)]
pub struct DistributionMapping {
    inner: Arc<DistributionData>,
}




// ============================================================================
impl DistributionMapping {


    /**
     * Compute a mapping for the given box array over `num_ranks` ranks.
     */
    pub fn new<S, const DIM: usize>(box_array: &BoxArray<DIM>, num_ranks: usize, strategy: &S) -> Result<Self>
    where
        S: DistributionStrategy
    {
        if num_ranks == 0 {
            return Err(Error::invalid("distribution over zero ranks"))
        }
        let ranks = strategy.assign(box_array, num_ranks)?;

        if ranks.len() != box_array.len() {
            return Err(Error::invalid("distribution strategy returned the wrong number of ranks"))
        }
        if let Some(r) = ranks.iter().find(|&&r| r >= num_ranks) {
            return Err(Error::out_of_range("rank", *r, num_ranks))
        }
        Ok(Self::from_ranks(ranks))
    }


    /**
     * Every box on rank zero.
     */
    pub fn single_rank<const DIM: usize>(box_array: &BoxArray<DIM>) -> Self {
        Self::from_ranks(vec![0; box_array.len()])
    }


    /**
     * Wrap an explicit rank list. Ranks are validated against the process
     * group when a fab array is defined.
     */
    pub fn from_ranks(ranks: Vec<usize>) -> Self {
        let id = NEXT_DISTRIBUTION_ID.fetch_add(1, Ordering::Relaxed);
        Self { inner: Arc::new(DistributionData { id, ranks }) }
    }


    pub fn id(&self) -> u64 {
        self.inner.id
    }


    pub fn is_same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }


    pub fn len(&self) -> usize {
        self.inner.ranks.len()
    }


    pub fn is_empty(&self) -> bool {
        self.inner.ranks.is_empty()
    }


    /**
     * Return the rank that owns box `i`.
     */
    pub fn processor_of(&self, i: usize) -> Result<usize> {
        self.inner.ranks
            .get(i)
            .copied()
            .ok_or_else(|| Error::out_of_range("box", i, self.len()))
    }


    pub fn ranks(&self) -> &[usize] {
        &self.inner.ranks
    }


    /**
     * Return the positions of all boxes owned by `rank`, ascending.
     */
    pub fn indices_on(&self, rank: usize) -> Vec<usize> {
        self.inner.ranks
            .iter()
            .enumerate()
            .filter(|(_, &r)| r == rank)
            .map(|(i, _)| i)
            .collect()
    }
}

impl PartialEq for DistributionMapping {
    fn eq(&self, other: &Self) -> bool {
        self.is_same(other) || self.ranks() == other.ranks()
    }
}

impl core::fmt::Debug for DistributionMapping {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        fmt.debug_struct("DistributionMapping")
            .field("id", &self.id())
            .field("ranks", &self.inner.ranks)
            .finish()
    }
}
