//! Common types for the tandem matching toolkit

pub mod error;

pub use error::{Error, Result};
