//! End-to-end scenarios over small graphs with known matching structure

mod common;

use common::{assert_maximal, assert_valid_matching, params_for, run_matching, run_pipeline};
use rustc_hash::FxHashSet;

#[test]
fn path_of_three_edges() {
    let edges = [[0, 1], [1, 2], [2, 3]];
    let matching = run_matching(&edges, 2, 0.5);

    assert_valid_matching(&matching);
    assert_maximal(&matching, &edges);
    assert!((1..=2).contains(&matching.len()));

    // Every path edge must have at least one matched endpoint.
    let matched: FxHashSet<i64> = matching.iter().flatten().copied().collect();
    for [u, v] in edges {
        assert!(matched.contains(&u) || matched.contains(&v));
    }
}

#[test]
fn triangle_matches_exactly_one_edge() {
    let edges = [[0, 1], [1, 2], [2, 0]];
    let matching = run_matching(&edges, 2, 0.2);
    assert_valid_matching(&matching);
    assert_maximal(&matching, &edges);
    assert_eq!(matching.len(), 1);
}

#[test]
fn six_cycle_matches_two_or_three() {
    let edges = [[0, 1], [1, 2], [2, 3], [3, 4], [4, 5], [5, 0]];
    let matching = run_matching(&edges, 2, 0.2);
    assert_valid_matching(&matching);
    assert_maximal(&matching, &edges);
    assert!((2..=3).contains(&matching.len()));
}

#[test]
fn complete_bipartite_k33_is_perfectly_matched() {
    let mut edges = Vec::new();
    for left in 0..3 {
        for right in 3..6 {
            edges.push([left, right]);
        }
    }
    let matching = run_matching(&edges, 2, 0.2);
    assert_valid_matching(&matching);
    assert_maximal(&matching, &edges);
    // Any maximal matching of K33 is perfect.
    assert_eq!(matching.len(), 3);
}

#[test]
fn two_disjoint_triangles_match_one_each() {
    let edges = [[0, 1], [1, 2], [2, 0], [3, 4], [4, 5], [5, 3]];
    let matching = run_matching(&edges, 4, 0.2);
    assert_valid_matching(&matching);
    assert_maximal(&matching, &edges);
    assert_eq!(matching.len(), 2);
}

#[test]
fn star_matches_exactly_one_spoke() {
    let edges: Vec<[i64; 2]> = (1..=10).map(|leaf| [0, leaf]).collect();
    let matching = run_matching(&edges, 4, 0.2);
    assert_valid_matching(&matching);
    assert_maximal(&matching, &edges);
    assert_eq!(matching.len(), 1);
    assert!(matching[0].contains(&0));
}

#[test]
fn empty_graph_yields_empty_matching() {
    let outcome = run_pipeline(&[], 2, params_for(&[], 0.2));
    assert!(outcome.matching.is_empty());
    let record = outcome.record.expect("rank 0 carries the record");
    assert_eq!(record.total_matching_size, 0);
    assert_eq!(record.total_phases, 0);
}

#[test]
fn single_edge_is_matched() {
    let edges = [[7, 9]];
    let matching = run_matching(&edges, 2, 0.2);
    assert_eq!(matching, vec![[7, 9]]);
}

#[test]
fn complete_graph_k5_matches_two() {
    let mut edges = Vec::new();
    for u in 0..5i64 {
        for v in (u + 1)..5 {
            edges.push([u, v]);
        }
    }
    let matching = run_matching(&edges, 3, 0.2);
    assert_valid_matching(&matching);
    assert_maximal(&matching, &edges);
    // Any maximal matching of K5 pairs off four of the five vertices.
    assert_eq!(matching.len(), 2);
}

#[test]
fn duplicate_and_commented_input_is_tolerated() {
    let edges = [[0, 1], [1, 0], [0, 1], [1, 2]];
    let matching = run_matching(&edges, 2, 0.2);
    assert_valid_matching(&matching);
    assert_maximal(&matching, &[[0, 1], [1, 2]]);
    assert_eq!(matching.len(), 1);
}

#[test]
fn metrics_record_reflects_the_run() {
    let edges = [[0, 1], [1, 2], [2, 3], [3, 4], [4, 5], [5, 0]];
    let outcome = run_pipeline(&edges, 2, params_for(&edges, 0.2));
    let record = outcome.record.expect("rank 0 carries the record");

    assert_eq!(record.ranks, 2);
    assert_eq!(record.total_matching_size as usize, outcome.matching.len());
    assert!(record.total_phases <= tandem_engine::config::MAX_PHASES);
    assert_eq!(record.phases.len(), record.total_phases);
    for phase in &record.phases {
        assert!(phase.active_edges > 0);
        assert!(phase.p > 0.0 && phase.p <= 0.5);
        assert!(phase.ball.max <= record.s_edges as u64);
    }
}
