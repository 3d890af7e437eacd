//! Run metrics: per-phase records, reductions, and artifacts
//!
//! Scalars that need a global view are reduced through the communicator;
//! distribution summaries (min/max/mean/p95) are computed per rank and
//! reduced component-wise, with p95 reduced by max, which over-reports the
//! tail by at most one rank's skew. Rank 0 serializes the collected records
//! to `metrics_run.json` plus a flat CSV at the end of the run.

use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tandem_collective::{Communicator, ReduceOp};
use tandem_common::Result;

/// Distribution summary of one per-edge quantity.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ValueSummary {
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub p95: u64,
}

/// Component-wise partial summary, reducible across ranks.
#[derive(Debug, Clone, Copy)]
pub struct LocalSummary {
    min: u64,
    max: u64,
    sum: u64,
    count: u64,
    p95: u64,
}

impl LocalSummary {
    /// Summarize this rank's values. Sorts a scratch copy to read the local
    /// 95th percentile.
    pub fn from_values(values: &[u64]) -> Self {
        if values.is_empty() {
            return Self {
                min: u64::MAX,
                max: 0,
                sum: 0,
                count: 0,
                p95: 0,
            };
        }
        let mut sorted = values.to_vec();
        sorted.sort_unstable();
        let p95_index = ((sorted.len() as f64 * 0.95).ceil() as usize)
            .clamp(1, sorted.len())
            - 1;
        Self {
            min: sorted[0],
            max: *sorted.last().unwrap_or(&0),
            sum: sorted.iter().sum(),
            count: sorted.len() as u64,
            p95: sorted[p95_index],
        }
    }

    /// Reduce component-wise across all ranks.
    pub fn reduce(&self, comm: &Communicator) -> Result<ValueSummary> {
        let min = comm.all_reduce(self.min, ReduceOp::Min)?;
        let max = comm.all_reduce(self.max, ReduceOp::Max)?;
        let sum = comm.all_reduce(self.sum, ReduceOp::Sum)?;
        let count = comm.all_reduce(self.count, ReduceOp::Sum)?;
        let p95 = comm.all_reduce(self.p95, ReduceOp::Max)?;
        Ok(ValueSummary {
            min: if count == 0 { 0 } else { min },
            max,
            mean: if count == 0 { 0.0 } else { sum as f64 / count as f64 },
            p95,
        })
    }
}

/// Globally aggregated record of one sparsification phase.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseRecord {
    pub phase_idx: usize,
    pub active_edges: u64,
    pub matching_size_new: u64,
    pub p: f64,
    pub deg: ValueSummary,
    pub stall_rate: f64,
    pub ball: ValueSummary,
    pub mis_selection_rate: f64,
    pub comm_bytes_max: u64,
    pub comm_items_max: u64,
    pub wall_seconds: f64,
}

/// Run-level record written by rank 0.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub s_edges: usize,
    pub r_rounds: usize,
    pub n_global: u64,
    pub ranks: usize,
    pub total_matching_size: u64,
    pub total_phases: usize,
    pub max_message_bytes: u64,
    pub phases: Vec<PhaseRecord>,
}

/// Write `metrics_run.json` and `metrics_phases.csv` under `dir`.
pub fn write_artifacts(dir: &Path, run: &RunRecord) -> Result<()> {
    std::fs::create_dir_all(dir)?;

    let json_path = dir.join("metrics_run.json");
    let json_file = BufWriter::new(File::create(&json_path)?);
    serde_json::to_writer_pretty(json_file, run).map_err(std::io::Error::from)?;

    let csv_path = dir.join("metrics_phases.csv");
    let mut csv = BufWriter::new(File::create(&csv_path)?);
    writeln!(
        csv,
        "phase_idx,active_edges,matching_size_new,p,deg_min,deg_max,deg_mean,deg_p95,\
         stall_rate,ball_max,ball_mean,ball_p95,mis_selection_rate,comm_bytes_max,\
         comm_items_max,wall_seconds"
    )?;
    for phase in &run.phases {
        writeln!(
            csv,
            "{},{},{},{:.6},{},{},{:.2},{},{:.4},{},{:.2},{},{:.4},{},{},{:.4}",
            phase.phase_idx,
            phase.active_edges,
            phase.matching_size_new,
            phase.p,
            phase.deg.min,
            phase.deg.max,
            phase.deg.mean,
            phase.deg.p95,
            phase.stall_rate,
            phase.ball.max,
            phase.ball.mean,
            phase.ball.p95,
            phase.mis_selection_rate,
            phase.comm_bytes_max,
            phase.comm_items_max,
            phase.wall_seconds,
        )?;
    }
    csv.flush()?;
    Ok(())
}
