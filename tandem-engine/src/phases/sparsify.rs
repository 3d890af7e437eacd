//! Sparsification: phase participation and line-graph degrees
//!
//! Participation is a coordination-free Bernoulli trial per edge: every rank
//! evaluates the same seeded hash, so the sparse subgraph H_s is globally
//! consistent without a single message. Degrees in H_s are then computed by
//! funnelling through vertex owners: each participating edge probes both
//! endpoint owners, the owners tally and answer, and the edge sums its two
//! replies minus the two slots it occupies itself.

use rustc_hash::FxHashMap;
use tandem_collective::Communicator;
use tandem_common::Result;
use tracing::debug;

use crate::hashing::{EdgeId, HashContext, VertexId};
use crate::state::EdgeState;
use crate::wire::{DegreeReply, EndpointProbe};

/// Select this phase's participants among active, non-stalled edges.
pub fn phase_participation(
    edges: &EdgeState,
    hash: &HashContext,
    phase: u64,
    iteration: u64,
    p: f64,
) -> Vec<bool> {
    (0..edges.len())
        .map(|row| {
            edges.active[row]
                && !edges.stalled[row]
                && hash.sampled(edges.edge_ids[row], phase, iteration, p)
        })
        .collect()
}

/// Compute `deg_in_sparse` for every participating edge: d_u + d_v - 2
/// within H_s, clamped at zero. Two collective exchanges.
pub fn sparse_degrees(
    comm: &mut Communicator,
    edges: &mut EdgeState,
    hash: &HashContext,
    participating: &[bool],
) -> Result<()> {
    let ranks = comm.size();
    edges.deg_in_sparse.iter_mut().for_each(|d| *d = 0);

    // Edge -> vertex: announce both endpoints of every participant.
    let mut probes: Vec<Vec<EndpointProbe>> = vec![Vec::new(); ranks];
    for row in 0..edges.len() {
        if !participating[row] {
            continue;
        }
        let [u, v] = edges.endpoints[row];
        let eid = edges.edge_ids[row];
        probes[hash.vertex_owner(u, ranks)].push(EndpointProbe { vertex: u, eid });
        probes[hash.vertex_owner(v, ranks)].push(EndpointProbe { vertex: v, eid });
    }
    let received = comm.exchange(probes)?;

    // Vertex tally: per-phase scratch, dropped on return.
    let mut counts: FxHashMap<VertexId, i64> = FxHashMap::default();
    let mut requests: FxHashMap<VertexId, Vec<EdgeId>> = FxHashMap::default();
    for buf in &received {
        for probe in buf {
            *counts.entry(probe.vertex).or_insert(0) += 1;
            requests.entry(probe.vertex).or_default().push(probe.eid);
        }
    }

    // Vertex -> edge: answer every request with the endpoint's degree.
    let mut replies: Vec<Vec<DegreeReply>> = vec![Vec::new(); ranks];
    for (vertex, eids) in &requests {
        let degree = counts[vertex];
        for &eid in eids {
            replies[hash.edge_owner(eid, ranks)].push(DegreeReply { eid, degree });
        }
    }
    let answered = comm.exchange(replies)?;

    // Sum the two endpoint degrees per edge, subtract the edge itself.
    let mut totals: FxHashMap<usize, i64> = FxHashMap::default();
    for buf in &answered {
        for reply in buf {
            if let Some(&row) = edges.id_to_index.get(&reply.eid) {
                *totals.entry(row).or_insert(0) += reply.degree;
            } else {
                debug!(eid = reply.eid, "degree reply for unknown edge ignored");
            }
        }
    }
    for (row, total) in totals {
        edges.deg_in_sparse[row] = (total - 2).max(0) as u32;
    }
    Ok(())
}
