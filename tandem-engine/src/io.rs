//! Edge-list loading and ownership scatter
//!
//! Rank 0 parses the input and buckets each edge by its owner; everyone then
//! receives its bucket through one scatter. Owners are derived from the
//! canonical edge id, so the partition agrees with every later lookup. A
//! failure on rank 0 unwinds before or during the scatter and takes the
//! whole world down, which is the intended abort path for bad input.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tandem_collective::Communicator;
use tandem_common::{Error, Result};
use tracing::{debug, info};

use crate::hashing::{HashContext, VertexId};

/// Load `path` on rank 0, hash-partition edges to owners, scatter, and
/// return this rank's endpoint pairs.
///
/// Input format: one `u v` pair per line, decimal, whitespace separated.
/// Lines starting with `#` and blank lines are skipped; self-loops are
/// dropped at the owner mapping.
pub fn load_and_scatter(
    comm: &mut Communicator,
    hash: &HashContext,
    path: &Path,
) -> Result<Vec<[VertexId; 2]>> {
    let buckets = if comm.rank() == 0 {
        Some(read_into_buckets(path, hash, comm.size())?)
    } else {
        None
    };

    let words = comm.scatter_from_root::<i64>(buckets)?;
    if words.len() % 2 != 0 {
        return Err(Error::Protocol {
            rank: comm.rank(),
            detail: format!("scatter delivered {} words, expected pairs", words.len()),
        });
    }

    let pairs: Vec<[VertexId; 2]> = words.chunks_exact(2).map(|w| [w[0], w[1]]).collect();
    debug!(rank = comm.rank(), edges = pairs.len(), "received edge partition");
    Ok(pairs)
}

/// Parse the edge list and flatten each owner's edges into `[u, v]` word
/// pairs, one bucket per rank.
fn read_into_buckets(path: &Path, hash: &HashContext, ranks: usize) -> Result<Vec<Vec<i64>>> {
    info!(path = %path.display(), "loading edge list");
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut buckets: Vec<Vec<i64>> = vec![Vec::new(); ranks];
    let mut kept = 0u64;
    let mut dropped_loops = 0u64;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut fields = trimmed.split_whitespace();
        let (u, v) = match (fields.next(), fields.next()) {
            (Some(a), Some(b)) => {
                let u = parse_vertex(a, path, line_no + 1)?;
                let v = parse_vertex(b, path, line_no + 1)?;
                (u, v)
            }
            _ => continue,
        };
        if u == v {
            dropped_loops += 1;
            continue;
        }
        let owner = hash.edge_owner_of(u, v, ranks);
        buckets[owner].extend_from_slice(&[u, v]);
        kept += 1;
    }

    info!(edges = kept, self_loops = dropped_loops, "edge list partitioned");
    Ok(buckets)
}

fn parse_vertex(field: &str, path: &Path, line: usize) -> Result<VertexId> {
    field.parse::<VertexId>().map_err(|_| Error::Parse {
        path: path.display().to_string(),
        line,
        message: format!("expected a decimal vertex id, got {field:?}"),
    })
}
