//! Error types for the tandem matching toolkit
//!
//! One variant per failure class. Everything except `Abort` originates on a
//! single rank; `Abort` is what the surviving ranks observe when a peer tears
//! the world down.

use thiserror::Error;

/// Main error type for tandem operations
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid run configuration (bad flag value, alpha outside (0,1), ...)
    #[error("invalid configuration: {0}")]
    Config(String),

    /// File or parse failure while loading the input graph
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed line in an edge-list file
    #[error("parse error at {path}:{line}: {message}")]
    Parse {
        path: String,
        line: usize,
        message: String,
    },

    /// Per-machine memory cap exceeded (ball over S, oversize frame)
    #[error("memory cap exceeded on rank {rank}: {detail}")]
    MemoryCap { rank: usize, detail: String },

    /// Wire protocol violation (frame size disagrees with announced count,
    /// message references an id this rank does not own)
    #[error("protocol violation on rank {rank}: {detail}")]
    Protocol { rank: usize, detail: String },

    /// A peer rank failed and closed its channels
    #[error("collective aborted: rank {rank} lost contact with rank {peer}")]
    Abort { rank: usize, peer: usize },

    /// A state the algorithm guarantees cannot be reached
    #[error("unreachable state: {0}")]
    Unreachable(String),
}

/// Convenience result type for tandem operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_rank() {
        let err = Error::MemoryCap {
            rank: 3,
            detail: "ball size 4097 exceeds cap 4096".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("rank 3"));
        assert!(msg.contains("4097"));
    }

    #[test]
    fn io_errors_convert() {
        fn open_missing() -> Result<std::fs::File> {
            Ok(std::fs::File::open("/nonexistent/tandem-test-path")?)
        }
        assert!(matches!(open_missing(), Err(Error::Io(_))));
    }
}
