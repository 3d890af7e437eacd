//! Finishing: clear the residual graph
//!
//! Once the phase loop stops making progress the residue is either small
//! enough to solve on rank 0 after one gather, or it is fed through a
//! bounded number of full-participation radius-1 phases. The gather bound is
//! S scaled by a large safety factor; overflowing it switches to the
//! distributed fallback, logged but not an error.

use rustc_hash::FxHashSet;
use tandem_collective::{Communicator, ReduceOp};
use tandem_common::Result;
use tracing::{info, warn};

use crate::config::{RunConfig, FINISH_FALLBACK_ROUNDS};
use crate::hashing::{HashContext, VertexId};
use crate::phases::{exponentiate, integrate, local_mis};
use crate::state::{EdgeState, VertexState};
use crate::wire::EdgePair;

/// Priority domain for fallback rounds, disjoint from the phase loop's
/// indices by a wide margin.
const FALLBACK_PHASE_BASE: u64 = 1_000;

/// Match whatever edges remain active. Returns pairs matched locally (the
/// gathered path returns them all on rank 0).
pub fn finish_residual(
    comm: &mut Communicator,
    edges: &mut EdgeState,
    verts: &VertexState,
    hash: &HashContext,
    config: &RunConfig,
) -> Result<Vec<[VertexId; 2]>> {
    let local_active: Vec<EdgePair> = (0..edges.len())
        .filter(|&row| edges.active[row])
        .map(|row| {
            let [u, v] = edges.endpoints[row];
            EdgePair { u, v }
        })
        .collect();
    let residual = comm.all_reduce(local_active.len() as u64, ReduceOp::Sum)?;
    if residual == 0 {
        return Ok(Vec::new());
    }

    if residual <= config.finish_gather_threshold() {
        if comm.rank() == 0 {
            info!(residual, "finishing residual graph on rank 0");
        }
        let gathered = comm.gather_to_root(&local_active)?;
        return Ok(match gathered {
            Some(per_source) => {
                let all: Vec<EdgePair> = per_source.into_iter().flatten().collect();
                sequential_greedy(&all)
            }
            None => Vec::new(),
        });
    }

    if comm.rank() == 0 {
        warn!(
            residual,
            threshold = config.finish_gather_threshold(),
            "residual exceeds gather threshold, running distributed fallback"
        );
    }

    let mut matches = Vec::new();
    for round in 0..FINISH_FALLBACK_ROUNDS {
        edges.clear_stalls();
        let candidates = edges.active.clone();
        let growth = exponentiate::build_balls(
            comm,
            edges,
            verts,
            hash,
            &candidates,
            1,
            config.s_edges,
            config.strict,
        )?;
        if let exponentiate::BallGrowth::Abandoned { peak } = growth {
            warn!(round, peak, "fallback round overflowed the cap, stopping");
            break;
        }

        let (chosen, _) = local_mis::run_local_mis(
            edges,
            hash,
            FALLBACK_PHASE_BASE + round as u64,
            &candidates,
        );
        matches.extend(integrate::commit_and_prune(comm, edges, hash, &chosen)?);

        let remaining = comm.all_reduce(edges.active_count() as u64, ReduceOp::Sum)?;
        if remaining == 0 {
            break;
        }
    }
    Ok(matches)
}

/// Greedy matching over a gathered edge list: first edge with two free
/// endpoints wins.
fn sequential_greedy(pairs: &[EdgePair]) -> Vec<[VertexId; 2]> {
    let mut matched: FxHashSet<VertexId> = FxHashSet::default();
    let mut out = Vec::new();
    for pair in pairs {
        if !matched.contains(&pair.u) && !matched.contains(&pair.v) {
            matched.insert(pair.u);
            matched.insert(pair.v);
            out.push([pair.u, pair.v]);
        }
    }
    out
}
