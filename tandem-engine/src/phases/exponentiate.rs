//! Graph exponentiation: vertex-mediated ball growth
//!
//! Each round doubles the reach of every candidate edge's ball in the sparse
//! line graph. Direct edge-to-edge propagation would cost Θ(d²) messages at a
//! degree-d vertex; funnelling through the vertex owner costs Θ(d). The wire
//! format is a raw `i64` word stream of `[vertex, eid, len, ball...]` runs
//! outbound and `[eid, len, super_ball...]` runs back.
//!
//! The per-machine cap is enforced at every merge. A violation means the
//! sampling/stall contract failed upstream; in strict mode it is fatal,
//! otherwise all ranks vote at the end of the round and abandon the phase
//! together, reporting the peak so the driver's estimator can react.

use rustc_hash::FxHashMap;
use tandem_collective::{Communicator, ReduceOp};
use tandem_common::{Error, Result};
use tracing::{debug, warn};

use crate::hashing::{EdgeId, HashContext, VertexId};
use crate::state::{EdgeState, VertexState};

/// How a call to [`build_balls`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BallGrowth {
    /// Balls are serialized into the edge state's CSR.
    Completed,
    /// Some ball exceeded the cap; the phase's balls were discarded. `peak`
    /// is the largest merged size observed anywhere.
    Abandoned { peak: usize },
}

/// Grow radius-`rounds` balls for every candidate edge, then serialize them
/// into `ball_offsets`/`ball_storage`. Every ball stays within `cap` or the
/// growth ends per the strictness policy.
#[allow(clippy::too_many_arguments)]
pub fn build_balls(
    comm: &mut Communicator,
    edges: &mut EdgeState,
    verts: &VertexState,
    hash: &HashContext,
    candidates: &[bool],
    rounds: usize,
    cap: usize,
    strict: bool,
) -> Result<BallGrowth> {
    let ranks = comm.size();
    let rank = comm.rank();

    // Working balls, keyed by local row, always sorted and unique.
    let mut balls: FxHashMap<usize, Vec<EdgeId>> = FxHashMap::default();
    for row in 0..edges.len() {
        if candidates[row] {
            balls.insert(row, vec![edges.edge_ids[row]]);
        }
    }

    for round in 0..rounds {
        // Edge -> vertex: each candidate sends its ball to both endpoint
        // owners. Row order keeps outbound buffers deterministic.
        let mut push: Vec<Vec<i64>> = vec![Vec::new(); ranks];
        for row in 0..edges.len() {
            let Some(ball) = balls.get(&row) else {
                continue;
            };
            let [u, v] = edges.endpoints[row];
            let eid = edges.edge_ids[row];
            for x in [u, v] {
                let buf = &mut push[hash.vertex_owner(x, ranks)];
                buf.extend_from_slice(&[x, eid, ball.len() as i64]);
                buf.extend_from_slice(ball);
            }
        }
        let received = comm.exchange(push)?;

        // Vertex aggregation: concatenate incoming balls per vertex and
        // remember who asked. Scratch maps live for this round only.
        let mut inbox: FxHashMap<VertexId, Vec<EdgeId>> = FxHashMap::default();
        let mut subscribers: FxHashMap<VertexId, Vec<EdgeId>> = FxHashMap::default();
        for buf in &received {
            let mut cursor = 0;
            while cursor < buf.len() {
                if buf.len() - cursor < 3 {
                    return Err(truncated(rank, "ball push header"));
                }
                let vertex = buf[cursor];
                let eid = buf[cursor + 1];
                let len = buf[cursor + 2] as usize;
                cursor += 3;
                if buf.len() - cursor < len {
                    return Err(truncated(rank, "ball push payload"));
                }
                inbox
                    .entry(vertex)
                    .or_default()
                    .extend_from_slice(&buf[cursor..cursor + len]);
                subscribers.entry(vertex).or_default().push(eid);
                cursor += len;
            }
        }

        // Fold in co-resident candidates from the vertex CSR, then dedup.
        for (&vertex, members) in inbox.iter_mut() {
            if let Some(vrow) = verts.row(vertex) {
                for &edge_row in verts.incident(vrow) {
                    if candidates[edge_row as usize] {
                        members.push(edges.edge_ids[edge_row as usize]);
                    }
                }
            }
            members.sort_unstable();
            members.dedup();
        }

        // Vertex -> edge: every subscriber gets the vertex's super-ball.
        let mut in_play: Vec<VertexId> = subscribers.keys().copied().collect();
        in_play.sort_unstable();
        let mut reply: Vec<Vec<i64>> = vec![Vec::new(); ranks];
        for vertex in in_play {
            let super_ball = &inbox[&vertex];
            for &eid in &subscribers[&vertex] {
                let buf = &mut reply[hash.edge_owner(eid, ranks)];
                buf.extend_from_slice(&[eid, super_ball.len() as i64]);
                buf.extend_from_slice(super_ball);
            }
        }
        let answered = comm.exchange(reply)?;

        // Merge into current balls, watching the cap.
        let mut violation_peak = 0usize;
        for buf in &answered {
            let mut cursor = 0;
            while cursor < buf.len() {
                if buf.len() - cursor < 2 {
                    return Err(truncated(rank, "super-ball header"));
                }
                let eid = buf[cursor];
                let len = buf[cursor + 1] as usize;
                cursor += 2;
                if buf.len() - cursor < len {
                    return Err(truncated(rank, "super-ball payload"));
                }
                let incoming = &buf[cursor..cursor + len];
                cursor += len;

                let Some(&row) = edges.id_to_index.get(&eid) else {
                    debug!(eid, "super-ball for unknown edge ignored");
                    continue;
                };
                let Some(current) = balls.get(&row) else {
                    debug!(eid, "super-ball for non-candidate ignored");
                    continue;
                };
                let merged = merge_sorted_unique(current, incoming);
                if merged.len() > cap {
                    if strict {
                        return Err(Error::MemoryCap {
                            rank,
                            detail: format!(
                                "ball of edge {eid} reached {} against cap {cap} in round {round}",
                                merged.len()
                            ),
                        });
                    }
                    violation_peak = violation_peak.max(merged.len());
                } else {
                    balls.insert(row, merged);
                }
            }
        }

        // Cap verdict is collective: the whole phase stands or falls.
        let peak = comm.all_reduce(violation_peak as u64, ReduceOp::Max)? as usize;
        if peak > 0 {
            warn!(round, peak, cap, "ball cap exceeded, abandoning phase");
            edges.clear_balls();
            return Ok(BallGrowth::Abandoned { peak });
        }
    }

    // Serialize into CSR keyed by local row.
    let m = edges.len();
    let mut offsets = Vec::with_capacity(m + 1);
    offsets.push(0);
    let mut total = 0usize;
    for row in 0..m {
        total += balls.get(&row).map_or(0, Vec::len);
        offsets.push(total);
    }
    let mut storage = Vec::with_capacity(total);
    for row in 0..m {
        if let Some(ball) = balls.get(&row) {
            storage.extend_from_slice(ball);
        }
    }
    edges.ball_offsets = offsets;
    edges.ball_storage = storage;
    Ok(BallGrowth::Completed)
}

fn truncated(rank: usize, what: &str) -> Error {
    Error::Protocol {
        rank,
        detail: format!("truncated {what} in exponentiation stream"),
    }
}

/// Union of two sorted unique slices, sorted and unique.
fn merge_sorted_unique(a: &[EdgeId], b: &[EdgeId]) -> Vec<EdgeId> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}
