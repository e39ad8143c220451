use std::sync::Mutex;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, error};

use crate::error::{Error, Result};
use super::comm::{Communicator, Tag};

const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(30);

/// A message in flight between two ranks of a channel group.
///
pub struct Envelope {
    pub source: usize,
    pub tag: Tag,
    pub data: Vec<u8>,
}

/// A communicator whose peers are threads of the same process, connected by
/// unbounded crossbeam channels. Each rank owns one inbound channel;
/// envelopes that arrive ahead of the receive that wants them are parked in
/// a pending list until they are asked for.
///
pub struct ChannelCommunicator {
    rank: usize,
    num_peers: usize,
    outbound: Vec<Sender<Envelope>>,
    inbound: Receiver<Envelope>,
    pending: Mutex<Vec<Envelope>>,
    timeout: Duration,
}

impl ChannelCommunicator {
    /// Create a fully connected group of `num_peers` communicators. Element
    /// `r` of the result is rank `r`; each is meant to be moved to its own
    /// thread.
    ///
    pub fn group(num_peers: usize) -> Vec<Self> {
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..num_peers)
            .map(|_| crossbeam_channel::unbounded())
            .unzip();

        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, inbound)| ChannelCommunicator {
                rank,
                num_peers,
                outbound: senders.clone(),
                inbound,
                pending: Mutex::new(Vec::new()),
                timeout: DEFAULT_RECV_TIMEOUT,
            })
            .collect()
    }

    /// Set how long a receive may block before it is reported as a
    /// communication failure.
    ///
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn take_pending(&self, rank: usize, tag: Tag) -> Result<Option<Vec<u8>>> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| Error::comm("pending message list poisoned"))?;

        Ok(pending
            .iter()
            .position(|e| e.source == rank && e.tag == tag)
            .map(|n| pending.remove(n).data))
    }
}

impl Communicator for ChannelCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.num_peers
    }

    fn send(&self, rank: usize, tag: Tag, message: Vec<u8>) -> Result<()> {
        let sink = self
            .outbound
            .get(rank)
            .ok_or_else(|| Error::out_of_range("rank", rank, self.num_peers))?;

        sink.send(Envelope { source: self.rank, tag, data: message })
            .map_err(|_| Error::comm(format!("rank {} hung up", rank)))
    }

    fn recv(&self, rank: usize, tag: Tag) -> Result<Vec<u8>> {
        if rank >= self.num_peers {
            return Err(Error::out_of_range("rank", rank, self.num_peers))
        }
        if let Some(data) = self.take_pending(rank, tag)? {
            return Ok(data)
        }
        loop {
            match self.inbound.recv_timeout(self.timeout) {
                Ok(env) if env.source == rank && env.tag == tag => return Ok(env.data),
                Ok(env) => {
                    debug!(
                        "[{}] parking message from {} with tag {} while waiting on {}/{}",
                        self.rank, env.source, env.tag, rank, tag
                    );
                    self.pending
                        .lock()
                        .map_err(|_| Error::comm("pending message list poisoned"))?
                        .push(env)
                }
                Err(RecvTimeoutError::Timeout) => {
                    error!("[{}] timed out waiting for rank {} (tag {})", self.rank, rank, tag);
                    return Err(Error::comm(format!("timed out waiting for rank {}", rank)))
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::comm("inbound channel disconnected"))
                }
            }
        }
    }
}

/// The trivial process group: one rank, no peers. Collectives return their
/// input unchanged and any attempt to talk to another rank fails.
///
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialCommunicator;

impl Communicator for SerialCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn send(&self, rank: usize, _tag: Tag, _message: Vec<u8>) -> Result<()> {
        Err(Error::comm(format!("serial communicator cannot send to rank {}", rank)))
    }

    fn recv(&self, rank: usize, _tag: Tag) -> Result<Vec<u8>> {
        Err(Error::comm(format!("serial communicator cannot receive from rank {}", rank)))
    }
}
