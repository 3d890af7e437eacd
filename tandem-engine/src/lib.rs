//! Distributed maximal matching with strongly sublinear per-machine memory
//!
//! The engine computes a maximal matching of an undirected graph across P
//! ranks, each capped at S = Θ(n^α) edges of state. A run is a sequence of
//! sparsification phases; each phase samples an implicit line-graph subgraph,
//! stalls edges whose line-graph degree would overflow the cap, grows
//! radius-R neighborhoods by vertex-mediated exponentiation, extracts a
//! locally decidable independent set of edges, and prunes everything incident
//! to the winners. A guarded finishing step clears the residue.
//!
//! All routing is by pure hash functions of global identifiers, so every rank
//! derives the same owner for the same edge or vertex without coordination,
//! and every aggregation is a set union or a commutative sum, so results are
//! independent of message arrival order.

pub mod config;
pub mod driver;
pub mod hashing;
pub mod io;
pub mod metrics;
pub mod phases;
pub mod state;
pub mod wire;

pub use config::RunConfig;
pub use driver::{run, DriverOutcome};
pub use hashing::{EdgeId, HashContext, VertexId};
pub use state::{EdgeState, VertexState};
