//! Deterministic symmetric hashing: identities, ownership, priorities
//!
//! Every routing and sampling decision in the engine reduces to one seeded
//! 64-bit hash. The pair input is sorted before mixing, so
//! `hash64(a, b, ..) == hash64(b, a, ..)` and both endpoints of an edge
//! derive the same identity. Owners are derived from identities, never from
//! endpoints, so a reply addressed by id always lands on the rank that holds
//! the edge.

use sha2::{Digest, Sha256};

/// Global vertex identifier as it appears in the input edge list.
pub type VertexId = i64;

/// Canonical global edge identifier, symmetric in the endpoints.
pub type EdgeId = i64;

/// Seeded hash context shared by all ranks of a run.
#[derive(Debug, Clone, Copy)]
pub struct HashContext {
    seed: u64,
}

impl HashContext {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Signed 64-bit hash of a sorted pair plus phase/iteration/salt.
    pub fn hash64(&self, a: i64, b: i64, phase: u64, iteration: u64, salt: &str) -> i64 {
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        let mut hasher = Sha256::new();
        hasher.update(self.seed.to_le_bytes());
        hasher.update(low.to_le_bytes());
        hasher.update(high.to_le_bytes());
        hasher.update(phase.to_le_bytes());
        hasher.update(iteration.to_le_bytes());
        hasher.update(salt.as_bytes());
        let digest = hasher.finalize();
        let mut word = [0u8; 8];
        word.copy_from_slice(&digest[..8]);
        i64::from_le_bytes(word)
    }

    /// Canonical global edge id, symmetric in (u, v).
    pub fn edge_id(&self, u: VertexId, v: VertexId) -> EdgeId {
        self.hash64(u, v, 0, 0, "eid")
    }

    /// Owning rank of an edge, a function of the id alone.
    pub fn edge_owner(&self, eid: EdgeId, ranks: usize) -> usize {
        let h = self.hash64(eid, 0, 0, 0, "edge_owner");
        (h.unsigned_abs() % ranks as u64) as usize
    }

    /// Owning rank of a vertex.
    pub fn vertex_owner(&self, v: VertexId, ranks: usize) -> usize {
        let h = self.hash64(v, 0, 0, 0, "vertex_owner");
        (h.unsigned_abs() % ranks as u64) as usize
    }

    /// Owning rank of an edge given its endpoints; routes through the id so
    /// it always agrees with [`Self::edge_owner`].
    pub fn edge_owner_of(&self, u: VertexId, v: VertexId, ranks: usize) -> usize {
        self.edge_owner(self.edge_id(u, v), ranks)
    }

    /// Per-phase selection priority of an edge. Unsigned so the natural
    /// ordering matches the bit pattern.
    pub fn priority(&self, eid: EdgeId, phase: u64) -> u64 {
        self.hash64(eid, 0, phase, 0, "priority") as u64
    }

    /// Bernoulli(p) trial, identical on every rank: the hash magnitude is
    /// compared against p scaled to the positive 63-bit range.
    pub fn sampled(&self, eid: EdgeId, phase: u64, iteration: u64, p: f64) -> bool {
        let limit = (p * i64::MAX as f64) as u64;
        self.hash64(eid, 0, phase, iteration, "sample").unsigned_abs() <= limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_input_is_symmetric() {
        let ctx = HashContext::new(42);
        for (a, b) in [(0, 1), (5, 3), (-7, 11), (1_000_000, 2)] {
            assert_eq!(ctx.hash64(a, b, 3, 1, "x"), ctx.hash64(b, a, 3, 1, "x"));
            assert_eq!(ctx.edge_id(a, b), ctx.edge_id(b, a));
        }
    }

    #[test]
    fn edge_owner_agrees_for_both_orientations() {
        let ctx = HashContext::new(42);
        for ranks in [1, 2, 7, 64] {
            for (u, v) in [(0, 1), (9, 4), (123, 456)] {
                let owner = ctx.edge_owner_of(u, v, ranks);
                assert_eq!(owner, ctx.edge_owner_of(v, u, ranks));
                assert!(owner < ranks);
            }
        }
    }

    #[test]
    fn salt_and_phase_separate_domains() {
        let ctx = HashContext::new(42);
        assert_ne!(ctx.hash64(1, 2, 0, 0, "eid"), ctx.hash64(1, 2, 0, 0, "sample"));
        assert_ne!(ctx.priority(99, 0), ctx.priority(99, 1));
    }

    #[test]
    fn seed_changes_everything() {
        let a = HashContext::new(1);
        let b = HashContext::new(2);
        assert_ne!(a.edge_id(3, 4), b.edge_id(3, 4));
    }

    #[test]
    fn sampling_respects_degenerate_probabilities() {
        let ctx = HashContext::new(42);
        for eid in 0..200 {
            assert!(ctx.sampled(eid, 0, 0, 1.0));
            assert!(!ctx.sampled(eid, 0, 0, 0.0) || ctx.hash64(eid, 0, 0, 0, "sample") == 0);
        }
    }

    #[test]
    fn sampling_rate_tracks_probability() {
        let ctx = HashContext::new(42);
        let hits = (0..10_000)
            .filter(|&eid| ctx.sampled(eid, 1, 0, 0.5))
            .count();
        // Binomial(10000, 0.5) stays well within these bounds.
        assert!((4500..=5500).contains(&hits), "hits = {hits}");
    }
}
