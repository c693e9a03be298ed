//! # Data
//!
//! Synthetic labelled sequence batches for demos and tests.

mod synthetic;

pub use synthetic::{generate_synthetic_batch, SequenceBatch};
