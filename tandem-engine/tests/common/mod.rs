//! Shared helpers for the end-to-end suites

use rustc_hash::FxHashSet;
use std::io::Write;
use tandem_collective::{run_world, WorldConfig, DEFAULT_CHUNK_BYTES};
use tandem_engine::config::{RunConfig, RunParams};
use tandem_engine::driver::{self, DriverOutcome};

pub fn write_edge_list(edges: &[[i64; 2]]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for [u, v] in edges {
        writeln!(file, "{u} {v}").unwrap();
    }
    file.flush().unwrap();
    file
}

pub fn params_for(edges: &[[i64; 2]], alpha: f64) -> RunParams {
    let n = edges
        .iter()
        .flatten()
        .copied()
        .max()
        .map_or(1, |max| max as u64 + 1);
    RunParams {
        alpha,
        n_global: n,
        m_global: edges.len() as u64,
        ..RunParams::default()
    }
}

/// Run the full pipeline over `edges` on `ranks` ranks and return rank 0's
/// outcome (complete matching plus the metrics record).
pub fn run_pipeline(edges: &[[i64; 2]], ranks: usize, params: RunParams) -> DriverOutcome {
    let file = write_edge_list(edges);
    let config = RunConfig::derive(&params).unwrap();
    let world = WorldConfig {
        ranks,
        chunk_bytes: DEFAULT_CHUNK_BYTES,
    };
    let outcomes = run_world(&world, |comm| driver::run(comm, &config, file.path())).unwrap();
    outcomes.into_iter().next().unwrap()
}

pub fn run_matching(edges: &[[i64; 2]], ranks: usize, alpha: f64) -> Vec<[i64; 2]> {
    run_pipeline(edges, ranks, params_for(edges, alpha)).matching
}

/// Every vertex appears in at most one pair.
pub fn assert_valid_matching(matching: &[[i64; 2]]) {
    let mut seen = FxHashSet::default();
    for &[u, v] in matching {
        assert!(seen.insert(u), "vertex {u} matched twice");
        assert!(seen.insert(v), "vertex {v} matched twice");
    }
}

/// No input edge has both endpoints unmatched.
pub fn assert_maximal(matching: &[[i64; 2]], edges: &[[i64; 2]]) {
    let matched: FxHashSet<i64> = matching.iter().flatten().copied().collect();
    for &[u, v] in edges {
        if u == v {
            continue;
        }
        assert!(
            matched.contains(&u) || matched.contains(&v),
            "edge ({u}, {v}) could still be added to the matching"
        );
    }
}
