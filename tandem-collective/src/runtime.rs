//! World construction: channel mesh, rank threads, teardown

use crossbeam_channel::unbounded;
use std::thread;
use tandem_common::{Error, Result};
use tracing::debug;

use crate::communicator::{Communicator, Frame};
use crate::{DEFAULT_CHUNK_BYTES, RANKS_ENV};

/// Launch parameters for a collective world.
#[derive(Debug, Clone)]
pub struct WorldConfig {
    /// Number of ranks (machines in the MPC model).
    pub ranks: usize,
    /// Payload ceiling per destination per chunk iteration.
    pub chunk_bytes: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            ranks: world_size(),
            chunk_bytes: DEFAULT_CHUNK_BYTES,
        }
    }
}

/// Number of ranks the framework supplies: `TANDEM_RANKS` if set and
/// positive, otherwise the machine's logical CPU count.
pub fn world_size() -> usize {
    std::env::var(RANKS_ENV)
        .ok()
        .and_then(|raw| raw.parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or_else(num_cpus::get)
}

/// Run `f` once per rank on its own thread and collect the per-rank results
/// in rank order.
///
/// Every ordered rank pair gets a dedicated unbounded channel, so a receiver
/// can attribute frames to sources without tags and FIFO order per source is
/// structural. If any rank fails, its endpoints drop and every peer unwinds
/// from its next collective; the first non-abort error (the root cause) is
/// returned in preference to the secondary aborts.
pub fn run_world<T, F>(config: &WorldConfig, f: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(&mut Communicator) -> Result<T> + Sync,
{
    let size = config.ranks.max(1);
    let chunk_bytes = config.chunk_bytes.max(1);
    debug!(ranks = size, chunk_bytes, "launching collective world");

    // tx_rows[src][dst] pushes frames that rx_rows[dst][src] pulls.
    let mut tx_rows: Vec<Vec<crossbeam_channel::Sender<Frame>>> =
        (0..size).map(|_| Vec::with_capacity(size)).collect();
    let mut rx_rows: Vec<Vec<crossbeam_channel::Receiver<Frame>>> =
        (0..size).map(|_| Vec::with_capacity(size)).collect();
    for src in 0..size {
        for dst in 0..size {
            let (tx, rx) = unbounded();
            tx_rows[src].push(tx);
            rx_rows[dst].push(rx);
        }
    }

    let mut outcomes: Vec<Result<T>> = Vec::with_capacity(size);
    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(size);
        for (rank, (txs, rxs)) in tx_rows.drain(..).zip(rx_rows.drain(..)).enumerate() {
            let f = &f;
            handles.push(scope.spawn(move || {
                let mut comm = Communicator::new(rank, size, chunk_bytes, txs, rxs);
                f(&mut comm)
            }));
        }
        for handle in handles {
            outcomes.push(handle.join().unwrap_or_else(|_| {
                Err(Error::Unreachable("rank thread panicked".into()))
            }));
        }
    });

    // Prefer the originating failure over the Abort cascade it triggered.
    if outcomes.iter().any(|o| o.is_err()) {
        let mut first_abort = None;
        for outcome in outcomes {
            match outcome {
                Err(err @ Error::Abort { .. }) => {
                    if first_abort.is_none() {
                        first_abort = Some(err);
                    }
                }
                Err(err) => return Err(err),
                Ok(_) => {}
            }
        }
        return Err(first_abort
            .unwrap_or_else(|| Error::Unreachable("error vanished during collection".into())));
    }

    Ok(outcomes.into_iter().map(|o| o.expect("checked above")).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_see_their_own_identity() {
        let results = run_world(&WorldConfig { ranks: 5, chunk_bytes: 1024 }, |comm| {
            Ok((comm.rank(), comm.size()))
        })
        .unwrap();
        for (rank, (seen_rank, seen_size)) in results.into_iter().enumerate() {
            assert_eq!(rank, seen_rank);
            assert_eq!(seen_size, 5);
        }
    }

    #[test]
    fn single_rank_world_is_valid() {
        let results = run_world(&WorldConfig { ranks: 1, chunk_bytes: 1024 }, |comm| {
            let recv = comm.exchange(vec![vec![7i64, 8, 9]])?;
            Ok(recv[0].clone())
        })
        .unwrap();
        assert_eq!(results[0], vec![7, 8, 9]);
    }

    #[test]
    fn panicking_rank_is_reported() {
        let err = run_world(&WorldConfig { ranks: 2, chunk_bytes: 1024 }, |comm| {
            if comm.rank() == 1 {
                panic!("induced panic");
            }
            comm.barrier()
        })
        .unwrap_err();
        assert!(matches!(err, Error::Unreachable(_)));
    }
}
