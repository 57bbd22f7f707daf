//! Shared helpers for the geodelta benchmarks.

pub mod utils;
