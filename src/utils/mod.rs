//! Utility module
//!
//! This module provides:
//! - Configuration management
//! - Logging setup
//! - Evaluation metrics

mod config;
mod logging;
mod metrics;

pub use config::{Config, LoggingConfig, LossConfig};
pub use logging::setup_logging;
pub use metrics::{accuracy, mean_decision_time, relative_earliness};
