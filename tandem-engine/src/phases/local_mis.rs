//! Local maximum selection over each edge's ball
//!
//! An edge is chosen iff its phase priority beats every other id in its
//! ball, ties broken by the larger id. Balls are symmetric, so two edges
//! adjacent in the sparse line graph always see each other and can never
//! both win; no communication is needed to decide.

use crate::hashing::HashContext;
use crate::state::EdgeState;

/// Selection outcome for the metrics record.
#[derive(Debug, Clone, Copy)]
pub struct MisStats {
    pub candidates: usize,
    pub chosen: usize,
    pub selection_rate: f64,
}

/// Decide, per candidate edge, whether it is the local maximum of its ball.
pub fn run_local_mis(
    edges: &EdgeState,
    hash: &HashContext,
    phase: u64,
    candidates: &[bool],
) -> (Vec<bool>, MisStats) {
    let mut chosen = vec![false; edges.len()];
    let mut candidate_count = 0;
    let mut chosen_count = 0;

    for row in 0..edges.len() {
        if !candidates[row] {
            continue;
        }
        candidate_count += 1;

        let my_eid = edges.edge_ids[row];
        let my_priority = hash.priority(my_eid, phase);
        let is_local_max = edges.ball(row).iter().all(|&other| {
            other == my_eid || (hash.priority(other, phase), other) < (my_priority, my_eid)
        });

        if is_local_max {
            chosen[row] = true;
            chosen_count += 1;
        }
    }

    let stats = MisStats {
        candidates: candidate_count,
        chosen: chosen_count,
        selection_rate: if candidate_count == 0 {
            0.0
        } else {
            chosen_count as f64 / candidate_count as f64
        },
    };
    (chosen, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::EdgeId;

    fn ctx() -> HashContext {
        HashContext::new(42)
    }

    /// Build single-rank state with every edge holding the full edge set as
    /// its ball, the radius-1 picture of a clique in the line graph.
    fn clique_state(pairs: &[[i64; 2]]) -> EdgeState {
        let mut edges = EdgeState::from_scattered(pairs, &ctx());
        let mut everyone: Vec<EdgeId> = edges.edge_ids.clone();
        everyone.sort_unstable();
        let m = edges.len();
        edges.ball_offsets = (0..=m).map(|row| row * m).collect();
        edges.ball_storage = everyone.repeat(m);
        edges
    }

    #[test]
    fn exactly_one_winner_in_a_mutual_ball() {
        let edges = clique_state(&[[0, 1], [1, 2], [2, 0]]);
        let candidates = vec![true; edges.len()];
        let (chosen, stats) = run_local_mis(&edges, &ctx(), 0, &candidates);
        assert_eq!(chosen.iter().filter(|&&c| c).count(), 1);
        assert_eq!(stats.candidates, 3);
        assert_eq!(stats.chosen, 1);
    }

    #[test]
    fn singleton_ball_always_wins() {
        let mut edges = EdgeState::from_scattered(&[[0, 1], [5, 6]], &ctx());
        edges.ball_offsets = vec![0, 1, 2];
        edges.ball_storage = edges.edge_ids.clone();
        let (chosen, _) = run_local_mis(&edges, &ctx(), 3, &vec![true; 2]);
        assert_eq!(chosen, vec![true, true]);
    }

    #[test]
    fn non_candidates_are_never_chosen() {
        let edges = clique_state(&[[0, 1], [1, 2]]);
        let (chosen, stats) = run_local_mis(&edges, &ctx(), 0, &[false, false]);
        assert!(chosen.iter().all(|&c| !c));
        assert_eq!(stats.candidates, 0);
        assert_eq!(stats.selection_rate, 0.0);
    }

    #[test]
    fn winner_is_the_priority_maximum() {
        let edges = clique_state(&[[0, 1], [1, 2], [2, 3], [3, 4]]);
        let candidates = vec![true; edges.len()];
        let (chosen, _) = run_local_mis(&edges, &ctx(), 7, &candidates);

        let best = edges
            .edge_ids
            .iter()
            .map(|&eid| (ctx().priority(eid, 7), eid))
            .max()
            .unwrap()
            .1;
        for (row, &eid) in edges.edge_ids.iter().enumerate() {
            assert_eq!(chosen[row], eid == best);
        }
    }

    #[test]
    fn phase_changes_the_winner_eventually() {
        let edges = clique_state(&[[0, 1], [1, 2], [2, 0], [0, 3], [3, 4]]);
        let candidates = vec![true; edges.len()];
        let winners: Vec<usize> = (0..16)
            .map(|phase| {
                let (chosen, _) = run_local_mis(&edges, &ctx(), phase, &candidates);
                chosen.iter().position(|&c| c).unwrap()
            })
            .collect();
        assert!(
            winners.iter().any(|&w| w != winners[0]),
            "a fresh priority draw per phase should rotate winners"
        );
    }
}
