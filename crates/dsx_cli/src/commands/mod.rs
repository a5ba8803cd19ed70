//! CLI command implementations.

pub mod demo;
pub mod self_check;
