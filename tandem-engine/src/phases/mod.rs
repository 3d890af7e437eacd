//! Phase kernels, in pipeline order

pub mod exponentiate;
pub mod finish;
pub mod integrate;
pub mod local_mis;
pub mod sparsify;
pub mod stall;
