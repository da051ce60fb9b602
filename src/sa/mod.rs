//! Simulated-annealing search: temperature schedule, move operators,
//! adaptive operator weighting, and the elite archive (§4.5).

pub mod adaptive;
pub mod archive;
pub mod core;
pub mod operators;
