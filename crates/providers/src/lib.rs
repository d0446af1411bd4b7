//! Policy-oracle transports for blockmind.
//!
//! All oracles implement the `blockmind_core::PolicyOracle` trait.
//! Prompt rendering is shared so any completion-style backend can reuse it.

pub mod ollama;
pub mod prompt;

pub use ollama::{OllamaOracle, SamplingOptions};
