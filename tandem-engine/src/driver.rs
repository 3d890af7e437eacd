//! Outer phase loop: sampling policy, phase pipeline, termination
//!
//! Each phase runs Sparsify → Stall → Exponentiate → MIS → Integrate and
//! accumulates matched pairs until no active edges remain, then hands the
//! residue to Finish. The sampling probability adapts to a peak-hold
//! estimate of ball sizes: the expected load G·B of a phase must fit within
//! the aggregate memory P·S scaled by the safety factor, otherwise p shrinks
//! proportionally. Without the throttle a single high-degree vertex floods
//! ball storage in the first round.

use std::path::Path;
use std::time::Instant;
use tandem_collective::{Communicator, ReduceOp};
use tandem_common::Result;
use tracing::info;

use crate::config::{RunConfig, P_MAX, P_MIN};
use crate::hashing::{HashContext, VertexId};
use crate::io;
use crate::metrics::{LocalSummary, PhaseRecord, RunRecord, ValueSummary};
use crate::phases::exponentiate::BallGrowth;
use crate::phases::{exponentiate, finish, integrate, local_mis, sparsify, stall};
use crate::state::{EdgeState, VertexState};
use crate::wire::EdgePair;

/// What a completed run hands back to the caller.
#[derive(Debug)]
pub struct DriverOutcome {
    /// The full matching on rank 0; empty on every other rank.
    pub matching: Vec<[VertexId; 2]>,
    /// The metrics record on rank 0; `None` elsewhere.
    pub record: Option<RunRecord>,
}

/// Sampling probability for a phase: full P_MAX while the expected load
/// G·B fits in P·S·safety, shrinking proportionally past that.
fn adaptive_p(
    global_active: u64,
    max_ball_seen: u64,
    ranks: usize,
    s_edges: usize,
    safety_factor: f64,
) -> f64 {
    let ball_estimate = 2 * max_ball_seen.max(1);
    let load = global_active as f64 * ball_estimate as f64;
    let capacity = ranks as f64 * s_edges as f64 * safety_factor;
    if load > capacity {
        (capacity / load).clamp(P_MIN, P_MAX)
    } else {
        P_MAX
    }
}

/// Load the graph and run the full algorithm on this rank.
pub fn run(comm: &mut Communicator, config: &RunConfig, input: &Path) -> Result<DriverOutcome> {
    let hash = HashContext::new(config.seed);

    let pairs = io::load_and_scatter(comm, &hash, input)?;
    let mut edges = EdgeState::from_scattered(&pairs, &hash);
    let verts = VertexState::build(&edges, &hash, comm.rank(), comm.size());
    comm.take_stats(); // scatter traffic is not phase traffic

    if comm.rank() == 0 {
        info!(
            ranks = comm.size(),
            s_edges = config.s_edges,
            r_rounds = config.r_rounds,
            "starting matching run"
        );
    }

    let mut local_matches: Vec<[VertexId; 2]> = Vec::new();
    let mut records: Vec<PhaseRecord> = Vec::new();
    let mut max_ball_seen: u64 = 1;
    let mut max_message_bytes: u64 = 0;
    let mut phases_run = 0;

    for phase in 0..config.max_phases {
        let phase_idx = phase as u64;
        let started = Instant::now();

        let global_active = comm.all_reduce(edges.active_count() as u64, ReduceOp::Sum)?;
        if global_active == 0 {
            break;
        }
        phases_run += 1;

        let p = adaptive_p(
            global_active,
            max_ball_seen,
            comm.size(),
            config.s_edges,
            config.safety_factor,
        );
        if comm.rank() == 0 {
            info!(phase, active = global_active, p, "phase start");
        }

        edges.clear_stalls();
        let participating = sparsify::phase_participation(&edges, &hash, phase_idx, 0, p);
        sparsify::sparse_degrees(comm, &mut edges, &hash, &participating)?;

        let deg_values: Vec<u64> = (0..edges.len())
            .filter(|&row| participating[row])
            .map(|row| edges.deg_in_sparse[row] as u64)
            .collect();
        let deg = LocalSummary::from_values(&deg_values).reduce(comm)?;

        let stall_stats = stall::apply_stalling(&mut edges, config.stall_threshold());
        let stalled_sum = comm.all_reduce(stall_stats.newly_stalled as u64, ReduceOp::Sum)?;
        let stall_rate = if global_active == 0 {
            0.0
        } else {
            stalled_sum as f64 / global_active as f64
        };

        let candidates: Vec<bool> = (0..edges.len())
            .map(|row| participating[row] && !edges.stalled[row] && edges.active[row])
            .collect();

        let growth = exponentiate::build_balls(
            comm,
            &mut edges,
            &verts,
            &hash,
            &candidates,
            config.r_rounds,
            config.s_edges,
            config.strict,
        )?;

        let (ball, new_matched, mis_rate) = match growth {
            BallGrowth::Abandoned { peak } => {
                max_ball_seen = max_ball_seen.max(peak as u64);
                let ball = ValueSummary {
                    min: 0,
                    max: peak as u64,
                    mean: 0.0,
                    p95: 0,
                };
                (ball, 0, 0.0)
            }
            BallGrowth::Completed => {
                let ball_values: Vec<u64> = (0..edges.len())
                    .filter(|&row| candidates[row])
                    .map(|row| edges.ball(row).len() as u64)
                    .collect();
                let ball = LocalSummary::from_values(&ball_values).reduce(comm)?;
                max_ball_seen = max_ball_seen.max(ball.max);

                let (chosen, mis_stats) =
                    local_mis::run_local_mis(&edges, &hash, phase_idx, &candidates);
                let new_pairs = integrate::commit_and_prune(comm, &mut edges, &hash, &chosen)?;

                let new_matched =
                    comm.all_reduce(new_pairs.len() as u64, ReduceOp::Sum)?;
                let mis_candidates =
                    comm.all_reduce(mis_stats.candidates as u64, ReduceOp::Sum)?;
                let mis_chosen = comm.all_reduce(mis_stats.chosen as u64, ReduceOp::Sum)?;
                local_matches.extend(new_pairs);

                let mis_rate = if mis_candidates == 0 {
                    0.0
                } else {
                    mis_chosen as f64 / mis_candidates as f64
                };
                (ball, new_matched, mis_rate)
            }
        };

        let comm_stats = comm.take_stats();
        let comm_bytes_max = comm.all_reduce(
            comm_stats.bytes_sent + comm_stats.bytes_received,
            ReduceOp::Max,
        )?;
        let comm_items_max = comm.all_reduce(
            comm_stats.items_sent + comm_stats.items_received,
            ReduceOp::Max,
        )?;
        max_message_bytes = max_message_bytes
            .max(comm.all_reduce(comm_stats.max_message_bytes, ReduceOp::Max)?);

        let wall_micros =
            comm.all_reduce(started.elapsed().as_micros() as u64, ReduceOp::Max)?;

        records.push(PhaseRecord {
            phase_idx: phase,
            active_edges: global_active,
            matching_size_new: new_matched,
            p,
            deg,
            stall_rate,
            ball,
            mis_selection_rate: mis_rate,
            comm_bytes_max,
            comm_items_max,
            wall_seconds: wall_micros as f64 / 1e6,
        });

        if comm.rank() == 0 {
            info!(
                phase,
                matched = new_matched,
                stall_rate,
                ball_max = ball.max,
                "phase done"
            );
        }
    }

    local_matches.extend(finish::finish_residual(comm, &mut edges, &verts, &hash, config)?);
    let finish_stats = comm.take_stats();
    max_message_bytes = max_message_bytes
        .max(comm.all_reduce(finish_stats.max_message_bytes, ReduceOp::Max)?);

    let total_matching_size =
        comm.all_reduce(local_matches.len() as u64, ReduceOp::Sum)?;

    // Bring the full matching together on rank 0.
    let local_pairs: Vec<EdgePair> = local_matches
        .iter()
        .map(|&[u, v]| EdgePair { u, v })
        .collect();
    let gathered = comm.gather_to_root(&local_pairs)?;
    let matching: Vec<[VertexId; 2]> = gathered
        .map(|per_source| {
            per_source
                .into_iter()
                .flatten()
                .map(|pair| [pair.u, pair.v])
                .collect()
        })
        .unwrap_or_default();

    let record = (comm.rank() == 0).then(|| {
        info!(
            matching = total_matching_size,
            phases = phases_run,
            "run complete"
        );
        RunRecord {
            s_edges: config.s_edges,
            r_rounds: config.r_rounds,
            n_global: config.n_global,
            ranks: comm.size(),
            total_matching_size,
            total_phases: phases_run,
            max_message_bytes,
            phases: records,
        }
    });

    Ok(DriverOutcome { matching, record })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn p_is_half_when_load_fits() {
        assert_eq!(adaptive_p(100, 1, 4, 2000, 1.0), P_MAX);
    }

    #[test]
    fn p_shrinks_proportionally_under_pressure() {
        // load = 100_000 * 2 * 50 = 1e7, capacity = 4 * 2000 = 8000.
        let p = adaptive_p(100_000, 50, 4, 2000, 1.0);
        assert!(p < P_MAX);
        assert!((p - 8000.0 / 1e7).abs() < 1e-12);
    }

    #[test]
    fn p_never_leaves_its_bounds() {
        assert_eq!(adaptive_p(u64::MAX / 4, 1 << 30, 1, 2, 0.01), P_MIN);
        assert_eq!(adaptive_p(1, 1, 1024, 1 << 20, 1.0), P_MAX);
    }

    #[test]
    fn safety_factor_tightens_capacity() {
        let loose = adaptive_p(10_000, 100, 2, 2000, 1.0);
        let tight = adaptive_p(10_000, 100, 2, 2000, 0.5);
        assert!(tight < loose);
    }
}
