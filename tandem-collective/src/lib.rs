//! Bulk-synchronous collectives over an in-process rank mesh
//!
//! The world is P ranks, each an OS thread, coupled by one unbounded channel
//! per ordered rank pair. Every collective call is executed by all ranks in
//! the same program order, so a rank can consume exactly one frame per source
//! per collective without any tagging; FIFO delivery per pair gives the
//! within-source ordering guarantee.
//!
//! Failure model: a rank that returns an error drops its channel endpoints on
//! the way out. Every peer blocked in a collective then observes a
//! disconnected channel and unwinds with [`tandem_common::Error::Abort`],
//! which is the in-process equivalent of a collective abort.

pub mod communicator;
pub mod runtime;
pub mod stats;

pub use communicator::{Communicator, ReduceOp};
pub use runtime::{run_world, world_size, WorldConfig};
pub use stats::CommStats;

/// Payload ceiling per destination per chunk-loop iteration (256 MiB).
pub const DEFAULT_CHUNK_BYTES: usize = 256 * 1024 * 1024;

/// Environment variable consulted for the number of ranks.
pub const RANKS_ENV: &str = "TANDEM_RANKS";
