//! Degree-threshold stalling
//!
//! Any participant whose line-graph degree exceeds T = ⌈S^(1/R)⌉ is deferred
//! for the rest of the phase. Within a phase the mask only ever gains
//! members; the driver resets it when the next phase begins.

use crate::state::EdgeState;

/// What stalling did this phase, for the metrics record.
#[derive(Debug, Clone, Copy)]
pub struct StallStats {
    pub threshold: u32,
    pub newly_stalled: usize,
    pub active: usize,
    pub rate: f64,
}

/// Stall every active edge whose sparse degree exceeds `threshold`.
pub fn apply_stalling(edges: &mut EdgeState, threshold: u32) -> StallStats {
    let mut newly_stalled = 0;
    for row in 0..edges.len() {
        if edges.active[row] && !edges.stalled[row] && edges.deg_in_sparse[row] > threshold {
            edges.stalled[row] = true;
            newly_stalled += 1;
        }
    }
    let active = edges.active_count();
    StallStats {
        threshold,
        newly_stalled,
        active,
        rate: if active == 0 {
            0.0
        } else {
            newly_stalled as f64 / active as f64
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::HashContext;

    fn edges_with_degrees(degrees: &[u32]) -> EdgeState {
        let pairs: Vec<[i64; 2]> = (0..degrees.len() as i64).map(|i| [i, i + 100]).collect();
        let mut edges = EdgeState::from_scattered(&pairs, &HashContext::new(42));
        edges.deg_in_sparse.copy_from_slice(degrees);
        edges
    }

    #[test]
    fn stalls_only_above_threshold() {
        let mut edges = edges_with_degrees(&[1, 4, 5, 9]);
        let stats = apply_stalling(&mut edges, 4);
        assert_eq!(edges.stalled, vec![false, false, true, true]);
        assert_eq!(stats.newly_stalled, 2);
        assert!((stats.rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn stalling_is_monotone_within_a_phase() {
        let mut edges = edges_with_degrees(&[9, 9, 1]);
        apply_stalling(&mut edges, 4);
        let before = edges.stalled.clone();
        // Degrees dropping later in the phase must not unstall anyone.
        edges.deg_in_sparse.iter_mut().for_each(|d| *d = 0);
        let stats = apply_stalling(&mut edges, 4);
        assert_eq!(edges.stalled, before);
        assert_eq!(stats.newly_stalled, 0);
    }

    #[test]
    fn inactive_edges_are_ignored() {
        let mut edges = edges_with_degrees(&[9, 9]);
        edges.active[0] = false;
        apply_stalling(&mut edges, 4);
        assert_eq!(edges.stalled, vec![false, true]);
    }
}
