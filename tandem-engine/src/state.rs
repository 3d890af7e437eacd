//! Distributed edge and vertex state
//!
//! Edges live in struct-of-arrays form so phase kernels scan flat masks and
//! id arrays instead of chasing pointers. `id_to_index` resolves the global
//! id carried by every incoming message to a local row in O(1); it is a
//! bijection onto `0..len`. The vertex side is a CSR built once after
//! scatter: for each vertex this rank owns, the local indices of co-resident
//! edges touching it.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::hashing::{EdgeId, HashContext, VertexId};

/// Per-rank edge attributes, indexed by local edge row.
#[derive(Debug, Clone)]
pub struct EdgeState {
    /// Canonical (u < v) endpoints.
    pub endpoints: Vec<[VertexId; 2]>,
    pub edge_ids: Vec<EdgeId>,
    /// Still part of the residual graph.
    pub active: Vec<bool>,
    /// Deferred for the current phase; cleared at phase start, then only
    /// ever set.
    pub stalled: Vec<bool>,
    /// Line-graph degree within the current sparse subgraph.
    pub deg_in_sparse: Vec<u32>,
    /// Committed to the matching.
    pub matched: Vec<bool>,
    /// CSR of the current phase's balls, keyed by local row.
    pub ball_offsets: Vec<usize>,
    pub ball_storage: Vec<EdgeId>,
    pub id_to_index: FxHashMap<EdgeId, usize>,
}

impl EdgeState {
    /// Build local state from scattered endpoint pairs. Orientations are
    /// canonicalized and repeated edges (in either orientation) collapse to
    /// one row, keeping `id_to_index` a bijection.
    pub fn from_scattered(pairs: &[[VertexId; 2]], hash: &HashContext) -> Self {
        let mut endpoints = Vec::with_capacity(pairs.len());
        let mut edge_ids = Vec::with_capacity(pairs.len());
        let mut seen: FxHashSet<EdgeId> = FxHashSet::default();
        for &[a, b] in pairs {
            let (u, v) = if a <= b { (a, b) } else { (b, a) };
            let eid = hash.edge_id(u, v);
            if seen.insert(eid) {
                endpoints.push([u, v]);
                edge_ids.push(eid);
            }
        }

        let m = endpoints.len();
        let id_to_index = edge_ids
            .iter()
            .enumerate()
            .map(|(i, &eid)| (eid, i))
            .collect();
        Self {
            endpoints,
            edge_ids,
            active: vec![true; m],
            stalled: vec![false; m],
            deg_in_sparse: vec![0; m],
            matched: vec![false; m],
            ball_offsets: vec![0; m + 1],
            ball_storage: Vec::new(),
            id_to_index,
        }
    }

    pub fn len(&self) -> usize {
        self.edge_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edge_ids.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.active.iter().filter(|&&a| a).count()
    }

    /// The current ball of a local edge row.
    pub fn ball(&self, row: usize) -> &[EdgeId] {
        &self.ball_storage[self.ball_offsets[row]..self.ball_offsets[row + 1]]
    }

    /// Drop all ball storage, resetting every offset to zero.
    pub fn clear_balls(&mut self) {
        self.ball_offsets.iter_mut().for_each(|o| *o = 0);
        self.ball_storage.clear();
    }

    /// Reset the per-phase stall mask.
    pub fn clear_stalls(&mut self) {
        self.stalled.iter_mut().for_each(|s| *s = false);
    }
}

/// CSR adjacency from owned vertices to co-resident local edge rows.
/// Built once after scatter; never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexState {
    /// Owned vertices appearing in local edges, ascending.
    pub vertex_ids: Vec<VertexId>,
    pub offsets: Vec<usize>,
    /// Local edge rows, concatenated per vertex.
    pub storage: Vec<u32>,
    pub id_to_row: FxHashMap<VertexId, usize>,
}

impl VertexState {
    pub fn build(edges: &EdgeState, hash: &HashContext, rank: usize, ranks: usize) -> Self {
        let mut adjacency: FxHashMap<VertexId, Vec<u32>> = FxHashMap::default();
        for (row, &[u, v]) in edges.endpoints.iter().enumerate() {
            for x in [u, v] {
                if hash.vertex_owner(x, ranks) == rank {
                    adjacency.entry(x).or_default().push(row as u32);
                }
            }
        }

        // Ascending vertex order keeps the layout identical across rebuilds.
        let mut vertex_ids: Vec<VertexId> = adjacency.keys().copied().collect();
        vertex_ids.sort_unstable();

        let mut offsets = Vec::with_capacity(vertex_ids.len() + 1);
        offsets.push(0);
        let mut storage = Vec::new();
        for v in &vertex_ids {
            storage.extend_from_slice(&adjacency[v]);
            offsets.push(storage.len());
        }
        let id_to_row = vertex_ids
            .iter()
            .enumerate()
            .map(|(row, &v)| (v, row))
            .collect();

        Self {
            vertex_ids,
            offsets,
            storage,
            id_to_row,
        }
    }

    pub fn len(&self) -> usize {
        self.vertex_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_ids.is_empty()
    }

    /// Local edge rows incident to the vertex at `row`.
    pub fn incident(&self, row: usize) -> &[u32] {
        &self.storage[self.offsets[row]..self.offsets[row + 1]]
    }

    pub fn row(&self, v: VertexId) -> Option<usize> {
        self.id_to_row.get(&v).copied()
    }
}
