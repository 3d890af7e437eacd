//! Matching integration: commit winners, propagate, prune
//!
//! Three exchanges. Chosen edges go inactive at once and announce both
//! endpoints to their vertex owners; every still-active edge then asks each
//! endpoint owner whether the endpoint was just matched; owners answer with
//! kill orders routed by edge id. A kill for an id the owner no longer
//! recognizes is ignored, the edge was already pruned through its other
//! endpoint.

use rustc_hash::FxHashSet;
use tandem_collective::Communicator;
use tandem_common::Result;
use tracing::debug;

use crate::hashing::{HashContext, VertexId};
use crate::state::EdgeState;
use crate::wire::EndpointProbe;

/// Commit `chosen` edges to the matching, prune every active edge that lost
/// an endpoint, and return the pairs matched on this rank this phase.
pub fn commit_and_prune(
    comm: &mut Communicator,
    edges: &mut EdgeState,
    hash: &HashContext,
    chosen: &[bool],
) -> Result<Vec<[VertexId; 2]>> {
    let ranks = comm.size();

    // 1. Announce matched vertices.
    let mut matched_pairs = Vec::new();
    let mut announcements: Vec<Vec<i64>> = vec![Vec::new(); ranks];
    for row in 0..edges.len() {
        if !chosen[row] {
            continue;
        }
        let [u, v] = edges.endpoints[row];
        edges.matched[row] = true;
        edges.active[row] = false;
        matched_pairs.push([u, v]);
        announcements[hash.vertex_owner(u, ranks)].push(u);
        announcements[hash.vertex_owner(v, ranks)].push(v);
    }
    let announced = comm.exchange(announcements)?;
    let matched_vertices: FxHashSet<VertexId> =
        announced.into_iter().flatten().collect();

    // 2. Query residual edges.
    let mut queries: Vec<Vec<EndpointProbe>> = vec![Vec::new(); ranks];
    for row in 0..edges.len() {
        if !edges.active[row] {
            continue;
        }
        let [u, v] = edges.endpoints[row];
        let eid = edges.edge_ids[row];
        queries[hash.vertex_owner(u, ranks)].push(EndpointProbe { vertex: u, eid });
        queries[hash.vertex_owner(v, ranks)].push(EndpointProbe { vertex: v, eid });
    }
    let queried = comm.exchange(queries)?;

    // 3. Kill responses for endpoints that just became matched.
    let mut kills: Vec<Vec<i64>> = vec![Vec::new(); ranks];
    for buf in &queried {
        for probe in buf {
            if matched_vertices.contains(&probe.vertex) {
                kills[hash.edge_owner(probe.eid, ranks)].push(probe.eid);
            }
        }
    }
    let killed = comm.exchange(kills)?;

    for eid in killed.into_iter().flatten() {
        match edges.id_to_index.get(&eid) {
            Some(&row) => edges.active[row] = false,
            None => debug!(eid, "kill for unknown edge ignored"),
        }
    }

    Ok(matched_pairs)
}
