use std::collections::BTreeMap;
use log::debug;
use crate::error::{Error, Result};
use crate::fab::{Element, Fab};
use crate::fab_array_base::Layout;
use crate::index_box::IndexBox;
use crate::int_vect::IntVect;
use crate::message::comm::EXCHANGE_TAG;
use crate::periodicity::Periodicity;




/**
 * How values arriving at a destination are merged with what is there.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CopyOp {
    Copy,
    Add,
}




/**
 * One unit of a copy plan: the points of `dst_region` in destination box
 * `dst_index` receive the values at `dst_region - shift` of source box
 * `src_index`.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CopyTag<const DIM: usize> {
    pub src_index: usize,
    pub dst_index: usize,
    pub src_rank: usize,
    pub dst_rank: usize,
    pub dst_region: IndexBox<DIM>,
    pub shift: IntVect<DIM>,
}

impl<const DIM: usize> CopyTag<DIM> {
    pub fn src_region(&self) -> IndexBox<DIM> {
        self.dst_region.shift(-self.shift)
    }
}




/**
 * A complete description of a copy between two layouts. Every rank builds
 * the same plan from the same (global) box arrays and mappings, so each
 * rank knows which messages to send and which to expect without any
 * handshake.
 *
 * Tags are ordered by destination box, then source box, then periodic
 * shift. They are applied in that order, so overlapping `Copy` tags resolve
 * the same way on every run and `Add` tags accumulate in a fixed order.
 */
#[derive(Clone, Debug, Default)]
pub struct CopyPlan<const DIM: usize> {
    tags: Vec<CopyTag<DIM>>,
}




// ============================================================================
impl<const DIM: usize> CopyPlan<DIM> {




    /**
     * Build a plan. `dst_regions(i)` lists the disjoint parts of destination
     * box `i` that may be written, and `src_region(j)` the part of source
     * box `j` that may be read.
     */
    pub fn build<D, S>(
        src: &Layout<DIM>,
        dst: &Layout<DIM>,
        dst_regions: D,
        src_region: S,
        period: &Periodicity<DIM>) -> Result<Self>
    where
        D: Fn(usize) -> Result<Vec<IndexBox<DIM>>>,
        S: Fn(usize) -> Result<IndexBox<DIM>>,
    {
        let shifts = period.shifts();
        let src_regions = (0..src.box_array().len()).map(&src_region).collect::<Result<Vec<_>>>()?;
        let src_ranks = src.distribution_map().ranks();
        let dst_ranks = dst.distribution_map().ranks();
        let mut tags = Vec::new();

        for dst_index in 0..dst.box_array().len() {
            for piece in dst_regions(dst_index)? {
                for (src_index, region) in src_regions.iter().enumerate() {
                    for &shift in &shifts {
                        if let Some(dst_region) = piece.intersect(&region.shift(shift)) {
                            tags.push(CopyTag {
                                src_index,
                                dst_index,
                                src_rank: src_ranks[src_index],
                                dst_rank: dst_ranks[dst_index],
                                dst_region,
                                shift,
                            })
                        }
                    }
                }
            }
        }
        Ok(Self { tags })
    }


    pub fn tags(&self) -> &[CopyTag<DIM>] {
        &self.tags
    }


    pub fn len(&self) -> usize {
        self.tags.len()
    }


    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }


    /**
     * Carry out the plan on this rank. `src_fabs` and `dst_fabs` are the
     * local fabs of the two layouts, in local index order. Components
     * `src_comp..src_comp + num_comp` of the source are merged into the
     * components starting at `dst_comp` of the destination with `combine`,
     * which receives the destination value and the incoming value.
     */
    #[allow(clippy::too_many_arguments)]
    pub fn execute<T, F>(
        &self,
        src: &Layout<DIM>,
        src_fabs: &[Fab<T, DIM>],
        dst: &Layout<DIM>,
        dst_fabs: &mut [Fab<T, DIM>],
        src_comp: usize,
        dst_comp: usize,
        num_comp: usize,
        combine: F) -> Result<()>
    where
        T: Element,
        F: FnMut(&mut T, T),
    {
        let buffers = self.gather(src, src_fabs, src_comp, num_comp)?;
        self.scatter(dst, dst_fabs, buffers, dst_comp, num_comp, combine)
    }


    /**
     * First half of `execute`: pack every source region this rank owns, send
     * the ones bound for other ranks (grouped into one MessagePack message
     * per peer), and receive the ones bound for this rank. Returns the
     * buffers for this rank's destinations, keyed by tag position.
     *
     * Nothing is written, so the source fabs may be the same storage the
     * buffers are later scattered into.
     */
    pub fn gather<T: Element>(
        &self,
        src: &Layout<DIM>,
        src_fabs: &[Fab<T, DIM>],
        src_comp: usize,
        num_comp: usize) -> Result<BTreeMap<usize, Vec<T>>>
    {
        let comm = src.communicator();
        let rank = src.rank();
        let src_comps = src_comp..src_comp + num_comp;
        let mut outgoing: BTreeMap<usize, Vec<(usize, Vec<T>)>> = BTreeMap::new();
        let mut buffers = BTreeMap::new();

        for (n, tag) in self.tags.iter().enumerate().filter(|(_, t)| t.src_rank == rank) {
            let fab = local_fab(src, src_fabs, tag.src_index)?;
            let data = fab.pack(&tag.src_region(), src_comps.clone());

            if tag.dst_rank == rank {
                buffers.insert(n, data);
            } else {
                outgoing.entry(tag.dst_rank).or_default().push((n, data))
            }
        }

        for (peer, messages) in outgoing {
            debug!("[{}] sending {} regions to rank {}", rank, messages.len(), peer);
            let bytes = rmp_serde::encode::to_vec(&messages).map_err(|e| Error::comm(e.to_string()))?;
            comm.send(peer, EXCHANGE_TAG, bytes)?
        }

        let mut peers: Vec<usize> = self.tags
            .iter()
            .filter(|t| t.dst_rank == rank && t.src_rank != rank)
            .map(|t| t.src_rank)
            .collect();
        peers.sort_unstable();
        peers.dedup();

        for peer in peers {
            let bytes = comm.recv(peer, EXCHANGE_TAG)?;
            let messages: Vec<(usize, Vec<T>)> = rmp_serde::decode::from_slice(&bytes).map_err(|e| Error::comm(e.to_string()))?;
            debug!("[{}] received {} regions from rank {}", rank, messages.len(), peer);

            for (n, data) in messages {
                match self.tags.get(n) {
                    Some(t) if t.dst_rank == rank && t.src_rank == peer && data.len() == t.dst_region.num_pts() * num_comp => {
                        buffers.insert(n, data);
                    }
                    _ => return Err(Error::comm(format!("unexpected region {} from rank {}", n, peer))),
                }
            }
        }
        Ok(buffers)
    }


    /**
     * Second half of `execute`: merge gathered buffers into this rank's
     * destination fabs, in tag order.
     */
    pub fn scatter<T, F>(
        &self,
        dst: &Layout<DIM>,
        dst_fabs: &mut [Fab<T, DIM>],
        mut buffers: BTreeMap<usize, Vec<T>>,
        dst_comp: usize,
        num_comp: usize,
        mut combine: F) -> Result<()>
    where
        T: Element,
        F: FnMut(&mut T, T),
    {
        let rank = dst.rank();
        let dst_comps = dst_comp..dst_comp + num_comp;

        for (n, tag) in self.tags.iter().enumerate().filter(|(_, t)| t.dst_rank == rank) {
            let data = buffers.remove(&n).ok_or_else(|| Error::comm(format!("region {} never arrived", n)))?;
            let k = local_position(dst, tag.dst_index)?;
            let fab = dst_fabs.get_mut(k).ok_or(Error::InvalidState("fab array storage does not match its layout"))?;
            fab.unpack(&tag.dst_region, dst_comps.clone(), &data, &mut combine);
        }
        Ok(())
    }
}




// ============================================================================
fn local_position<const DIM: usize>(layout: &Layout<DIM>, i: usize) -> Result<usize> {
    layout.local_index_of(i)?.ok_or(Error::InvalidState("box is not owned by this rank"))
}

fn local_fab<'a, T, const DIM: usize>(layout: &Layout<DIM>, fabs: &'a [Fab<T, DIM>], i: usize) -> Result<&'a Fab<T, DIM>> {
    let k = local_position(layout, i)?;
    fabs.get(k).ok_or(Error::InvalidState("fab array storage does not match its layout"))
}
