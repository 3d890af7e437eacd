//! One rank's endpoint of the collective world
//!
//! All collectives follow the same discipline: push one frame to every
//! involved peer, then pull one frame from every involved source. Channels
//! are unbounded, so the push side never blocks and the symmetric program
//! order across ranks guarantees progress.

use bytemuck::Pod;
use crossbeam_channel::{Receiver, Sender};
use std::time::Instant;
use tandem_common::{Error, Result};

use crate::stats::CommStats;

/// Raw wire frame. Typed element slices are cast to bytes on send and
/// reinterpreted on receipt.
pub(crate) type Frame = Vec<u8>;

/// Reduction operator for [`Communicator::all_reduce`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Max,
    Min,
}

/// A single rank's view of the world.
pub struct Communicator {
    rank: usize,
    size: usize,
    chunk_bytes: usize,
    /// Senders indexed by destination rank (self included).
    peers_tx: Vec<Sender<Frame>>,
    /// Receivers indexed by source rank (self included).
    peers_rx: Vec<Receiver<Frame>>,
    stats: CommStats,
}

impl Communicator {
    pub(crate) fn new(
        rank: usize,
        size: usize,
        chunk_bytes: usize,
        peers_tx: Vec<Sender<Frame>>,
        peers_rx: Vec<Receiver<Frame>>,
    ) -> Self {
        debug_assert_eq!(peers_tx.len(), size);
        debug_assert_eq!(peers_rx.len(), size);
        Self {
            rank,
            size,
            chunk_bytes,
            peers_tx,
            peers_rx,
            stats: CommStats::default(),
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Drain and reset the per-phase communication counters.
    pub fn take_stats(&mut self) -> CommStats {
        std::mem::take(&mut self.stats)
    }

    fn push(&self, dst: usize, frame: Frame) -> Result<()> {
        self.peers_tx[dst].send(frame).map_err(|_| Error::Abort {
            rank: self.rank,
            peer: dst,
        })
    }

    fn pull(&self, src: usize) -> Result<Frame> {
        self.peers_rx[src].recv().map_err(|_| Error::Abort {
            rank: self.rank,
            peer: src,
        })
    }

    /// Fixed-width all-to-all of one `u64` per peer. Used for the metadata
    /// pre-exchange and the per-chunk count vectors.
    fn all_to_all_words(&self, words: &[u64]) -> Result<Vec<u64>> {
        debug_assert_eq!(words.len(), self.size);
        for (dst, &w) in words.iter().enumerate() {
            self.push(dst, w.to_le_bytes().to_vec())?;
        }
        let mut out = Vec::with_capacity(self.size);
        for src in 0..self.size {
            let frame = self.pull(src)?;
            let bytes: [u8; 8] = frame.as_slice().try_into().map_err(|_| Error::Protocol {
                rank: self.rank,
                detail: format!("count frame from rank {src} is {} bytes", frame.len()),
            })?;
            out.push(u64::from_le_bytes(bytes));
        }
        Ok(out)
    }

    /// Reduce one value across all ranks; every rank receives the result.
    pub fn all_reduce(&self, value: u64, op: ReduceOp) -> Result<u64> {
        let contributions = self.all_to_all_words(&vec![value; self.size])?;
        let folded = match op {
            ReduceOp::Sum => contributions.iter().sum(),
            ReduceOp::Max => contributions.into_iter().max().unwrap_or(0),
            ReduceOp::Min => contributions.into_iter().min().unwrap_or(0),
        };
        Ok(folded)
    }

    /// Synchronization point with no data.
    pub fn barrier(&self) -> Result<()> {
        self.all_reduce(0, ReduceOp::Sum).map(|_| ())
    }

    /// Chunked typed all-to-all: `send[r]` holds the elements destined for
    /// rank r; the result holds, per source rank, the elements it sent here,
    /// in the order that source enqueued them.
    ///
    /// Protocol: (1) all-to-all of total counts, sizing the receive buffers
    /// up front; (2) a chunk loop in which every sender moves at most
    /// `chunk_bytes` of payload per destination, announced by a second count
    /// vector and terminated by a global all-reduce over remaining items.
    /// Chunking keeps any in-flight frame bounded regardless of how skewed
    /// the destination buffers are.
    pub fn exchange<T: Pod>(&mut self, send: Vec<Vec<T>>) -> Result<Vec<Vec<T>>> {
        if send.len() != self.size {
            return Err(Error::Unreachable(format!(
                "exchange called with {} destination buffers for {} ranks",
                send.len(),
                self.size
            )));
        }
        let started = Instant::now();
        let item_bytes = std::mem::size_of::<T>().max(1);
        let chunk_items = (self.chunk_bytes / item_bytes).max(1);

        let totals: Vec<u64> = send.iter().map(|buf| buf.len() as u64).collect();
        let incoming = self.all_to_all_words(&totals)?;
        let mut recv: Vec<Vec<T>> = incoming
            .iter()
            .map(|&count| Vec::with_capacity(count as usize))
            .collect();

        let mut cursors = vec![0usize; self.size];
        loop {
            let moves: Vec<u64> = (0..self.size)
                .map(|dst| (send[dst].len() - cursors[dst]).min(chunk_items) as u64)
                .collect();
            let arrivals = self.all_to_all_words(&moves)?;

            for dst in 0..self.size {
                let count = moves[dst] as usize;
                let slice = &send[dst][cursors[dst]..cursors[dst] + count];
                let frame: Frame = bytemuck::cast_slice(slice).to_vec();
                if frame.len() > self.chunk_bytes {
                    return Err(Error::MemoryCap {
                        rank: self.rank,
                        detail: format!(
                            "outgoing frame of {} bytes exceeds chunk limit {}",
                            frame.len(),
                            self.chunk_bytes
                        ),
                    });
                }
                self.stats.record_sent(frame.len(), count);
                self.push(dst, frame)?;
                cursors[dst] += count;
            }

            for src in 0..self.size {
                let frame = self.pull(src)?;
                let expected = arrivals[src] as usize;
                if frame.len() != expected * item_bytes {
                    return Err(Error::Protocol {
                        rank: self.rank,
                        detail: format!(
                            "rank {src} announced {expected} items but sent {} bytes",
                            frame.len()
                        ),
                    });
                }
                self.stats.record_received(frame.len(), expected);
                let items: Vec<T> = bytemuck::pod_collect_to_vec(&frame);
                recv[src].extend_from_slice(&items);
            }

            let remaining: u64 = (0..self.size)
                .map(|dst| (send[dst].len() - cursors[dst]) as u64)
                .sum();
            if self.all_reduce(remaining, ReduceOp::Sum)? == 0 {
                break;
            }
        }

        self.stats.busy += started.elapsed();
        Ok(recv)
    }

    /// Gather every rank's buffer at rank 0. Returns `Some(per-source
    /// buffers)` on the root, `None` elsewhere. Gathers are not chunked:
    /// the caller is responsible for gating the gathered volume.
    pub fn gather_to_root<T: Pod>(&mut self, buf: &[T]) -> Result<Option<Vec<Vec<T>>>> {
        let started = Instant::now();
        let frame: Frame = bytemuck::cast_slice(buf).to_vec();
        self.stats.record_sent(frame.len(), buf.len());
        self.push(0, frame)?;

        let out = if self.rank == 0 {
            let item_bytes = std::mem::size_of::<T>().max(1);
            let mut gathered = Vec::with_capacity(self.size);
            for src in 0..self.size {
                let frame = self.pull(src)?;
                if frame.len() % item_bytes != 0 {
                    return Err(Error::Protocol {
                        rank: self.rank,
                        detail: format!(
                            "gather frame from rank {src} is {} bytes, not a multiple of {item_bytes}",
                            frame.len()
                        ),
                    });
                }
                self.stats.record_received(frame.len(), frame.len() / item_bytes);
                gathered.push(bytemuck::pod_collect_to_vec(&frame));
            }
            Some(gathered)
        } else {
            None
        };

        self.stats.busy += started.elapsed();
        Ok(out)
    }

    /// Scatter per-destination buffers from rank 0. The root passes
    /// `Some(bufs)` with one buffer per rank; everyone receives their slice.
    pub fn scatter_from_root<T: Pod>(&mut self, bufs: Option<Vec<Vec<T>>>) -> Result<Vec<T>> {
        let started = Instant::now();
        if self.rank == 0 {
            let bufs = bufs.ok_or_else(|| {
                Error::Unreachable("scatter root called without buffers".into())
            })?;
            if bufs.len() != self.size {
                return Err(Error::Unreachable(format!(
                    "scatter root holds {} buffers for {} ranks",
                    bufs.len(),
                    self.size
                )));
            }
            for (dst, buf) in bufs.into_iter().enumerate() {
                let frame: Frame = bytemuck::cast_slice(&buf).to_vec();
                self.stats.record_sent(frame.len(), buf.len());
                self.push(dst, frame)?;
            }
        }

        let frame = self.pull(0)?;
        let item_bytes = std::mem::size_of::<T>().max(1);
        if frame.len() % item_bytes != 0 {
            return Err(Error::Protocol {
                rank: self.rank,
                detail: format!(
                    "scatter frame is {} bytes, not a multiple of {item_bytes}",
                    frame.len()
                ),
            });
        }
        self.stats.record_received(frame.len(), frame.len() / item_bytes);
        let out = bytemuck::pod_collect_to_vec(&frame);
        self.stats.busy += started.elapsed();
        Ok(out)
    }
}
