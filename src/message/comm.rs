use crate::error::{Error, Result};
use super::util;




/// Message tag; a receive only matches a message with the same source rank
/// and tag. Messages with equal source and tag are delivered in send order.
///
pub type Tag = u32;

pub const BROADCAST_TAG: Tag = 1;
pub const REDUCE_TAG: Tag = 2;
pub const EXCHANGE_TAG: Tag = 3;




/// Binary operators for scalar all-reduce.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReduceOp {
    Min,
    Max,
    Sum,
}

impl ReduceOp {
    /// Combine two values. NaN propagates through `Min` and `Max`, unlike
    /// `f64::min` / `f64::max`.
    ///
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            ReduceOp::Sum => a + b,
            _ if a.is_nan() || b.is_nan() => f64::NAN,
            ReduceOp::Min => a.min(b),
            ReduceOp::Max => a.max(b),
        }
    }

    /// The value that leaves every other value unchanged under `apply`.
    ///
    pub fn identity(self) -> f64 {
        match self {
            ReduceOp::Min => f64::INFINITY,
            ReduceOp::Max => f64::NEG_INFINITY,
            ReduceOp::Sum => 0.0,
        }
    }
}




/// Interface for a group of processes that can exchange messages. The
/// underlying transport can in principle be threads in one process, TCP, or
/// a higher level abstraction like MPI. Implementors only provide `rank`,
/// `size`, `send` and `recv`; the collectives are derived from those.
///
/// Every rank of a group must call the collectives in the same order.
///
pub trait Communicator: Send + Sync {
    /// Must be implemented to return the rank of this process within the
    /// communicator.
    fn rank(&self) -> usize;

    /// Must be implemented to return the number of peers processes in this
    /// communicator.
    fn size(&self) -> usize;

    /// Must be implemented to send a message to a peer. This method must
    /// return immediately, in other words it is not allowed to block until a
    /// matching receive is posted.
    fn send(&self, rank: usize, tag: Tag, message: Vec<u8>) -> Result<()>;

    /// Must be implemented to receive the next message from the given peer
    /// with the given tag. This method is allowed to block until a message is
    /// ready to be received. Messages from other peers or with other tags
    /// that arrive in the meantime must be kept for later receives.
    fn recv(&self, rank: usize, tag: Tag) -> Result<Vec<u8>>;

    /// Implements a binomial tree broadcast from the root node (rank 0). The
    /// message buffer must be `Some` if this is the root node, and it is
    /// ignored otherwise.
    ///
    fn broadcast(&self, value: Option<Vec<u8>>) -> Result<Vec<u8>> {
        let r = self.rank();
        let p = self.size();
        let mut value = if r == 0 { value } else { None };

        for level in (0..util::ceil_log2(p)).rev() {
            let one = 1 << level;
            let two = 1 << (level + 1);

            if r % two == 0 {
                if r + one < p {
                    let message = value.clone().ok_or_else(|| Error::comm("broadcast root has no value"))?;
                    self.send(r + one, BROADCAST_TAG, message)?
                }
            } else if r % two == one {
                value = Some(self.recv(r - one, BROADCAST_TAG)?)
            }
        }
        value.ok_or_else(|| Error::comm("broadcast root has no value"))
    }

    /// Implements a binomial tree reduce. All ranks return `None` except for
    /// the root (rank 0).
    ///
    fn reduce(&self, f: &dyn Fn(Vec<u8>, Vec<u8>) -> Vec<u8>, mut value: Vec<u8>) -> Result<Option<Vec<u8>>> {
        let r = self.rank();
        let p = self.size();

        for level in 0..util::ceil_log2(p) {
            let one = 1 << level;
            let two = 1 << (level + 1);

            if r % two == 0 {
                if r + one < p {
                    value = f(value, self.recv(r + one, REDUCE_TAG)?)
                }
            } else {
                self.send(r - one, REDUCE_TAG, value)?;
                return Ok(None)
            }
        }
        Ok(Some(value))
    }

    /// Implements an all-reduce (symmetric fold) operation over a commutative
    /// binary operator.
    ///
    fn all_reduce(&self, f: &dyn Fn(Vec<u8>, Vec<u8>) -> Vec<u8>, value: Vec<u8>) -> Result<Vec<u8>> {
        let reduced = self.reduce(f, value)?;
        self.broadcast(reduced)
    }

    /// All-reduce of a single `f64`.
    ///
    fn all_reduce_f64(&self, op: ReduceOp, value: f64) -> Result<f64> {
        if self.size() == 1 {
            return Ok(value)
        }
        let f = move |a: Vec<u8>, b: Vec<u8>| {
            op.apply(util::decode_f64(&a), util::decode_f64(&b)).to_le_bytes().to_vec()
        };
        let bytes = self.all_reduce(&f, value.to_le_bytes().to_vec())?;
        Ok(util::decode_f64(&bytes))
    }

    /// Logical-or of a flag over all ranks.
    ///
    fn all_reduce_or(&self, value: bool) -> Result<bool> {
        if self.size() == 1 {
            return Ok(value)
        }
        let f = |a: Vec<u8>, b: Vec<u8>| vec![(a.iter().any(|x| *x != 0) || b.iter().any(|x| *x != 0)) as u8];
        let bytes = self.all_reduce(&f, vec![value as u8])?;
        Ok(bytes.first().map_or(false, |b| *b != 0))
    }
}
