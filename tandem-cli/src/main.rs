//! tandem: distributed maximal matching with sublinear per-machine memory

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tandem_collective::{run_world, WorldConfig};
use tandem_engine::config::{RunConfig, RunParams, DEFAULT_S_FLOOR};
use tandem_engine::metrics;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tandem")]
#[command(about = "Maximal matching of large graphs on a mesh of memory-capped ranks", long_about = None)]
struct Cli {
    /// Edge-list input file, one "u v" pair per line
    #[arg(long)]
    input: PathBuf,

    /// Number of vertices in the input graph
    #[arg(long)]
    n: u64,

    /// Number of edges in the input graph
    #[arg(long)]
    m: u64,

    /// Memory exponent: every rank holds at most ~n^alpha edges of state
    #[arg(long, default_value_t = 0.2)]
    alpha: f64,

    /// Advisory memory per rank in GB
    #[arg(long, default_value_t = 1.0)]
    mem: f64,

    /// Directory to write metrics_run.json and metrics_phases.csv into
    #[arg(long)]
    metrics_out: Option<PathBuf>,

    /// Fraction of aggregate memory the sampling policy may plan for, in (0, 1]
    #[arg(long, default_value_t = 1.0)]
    safety_factor: f64,

    /// Pin the per-rank edge budget S instead of deriving it from n and alpha
    #[arg(long)]
    s_edges: Option<usize>,

    /// Pin the exponentiation radius R instead of deriving it from n
    #[arg(long)]
    r_rounds: Option<usize>,

    /// Engineering floor applied to the derived S
    #[arg(long, default_value_t = DEFAULT_S_FLOOR)]
    s_floor: usize,

    /// Process-wide hash seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Abort the whole run on a memory-cap violation instead of abandoning
    /// the offending phase
    #[arg(long)]
    strict: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Configuration problems must surface before any collective launches.
    let config = RunConfig::derive(&RunParams {
        alpha: cli.alpha,
        n_global: cli.n,
        m_global: cli.m,
        mem_per_rank_gb: cli.mem,
        safety_factor: cli.safety_factor,
        s_edges: cli.s_edges,
        r_rounds: cli.r_rounds,
        s_floor: cli.s_floor,
        seed: cli.seed,
        strict: cli.strict,
    })?;

    let world = WorldConfig::default();
    info!(
        ranks = world.ranks,
        s_edges = config.s_edges,
        r_rounds = config.r_rounds,
        input = %cli.input.display(),
        "launching"
    );

    let outcomes = run_world(&world, |comm| {
        tandem_engine::driver::run(comm, &config, &cli.input)
    })?;
    let outcome = outcomes
        .into_iter()
        .next()
        .context("collective world returned no ranks")?;

    if let (Some(dir), Some(record)) = (&cli.metrics_out, &outcome.record) {
        metrics::write_artifacts(dir, record)
            .with_context(|| format!("writing metrics under {}", dir.display()))?;
        info!(dir = %dir.display(), "metrics written");
    }

    println!("matching size: {}", outcome.matching.len());
    Ok(())
}
