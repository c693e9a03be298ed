//! # Early RNN - early classification of time series
//!
//! A dual-output recurrent network: at every timestep it predicts a class
//! distribution and the probability of committing to a decision. The
//! decision probabilities form a halting distribution over timesteps that
//! the losses use to trade accuracy against earliness.
//!
//! ## Modules
//!
//! - `model` - Encoders, normalization, heads and [`DualOutputRnn`]
//! - `halting` - Halting distribution and its entropy
//! - `losses` - Earliness-aware losses and plain cross-entropy
//! - `predict` - Class at the most likely decision time
//! - `snapshot` - Parameter snapshots on disk
//! - `data` - Synthetic sequence batches
//! - `utils` - Configuration, logging and metrics
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use early_rnn::data::generate_synthetic_batch;
//! use early_rnn::{DualOutputConfig, DualOutputRnn, Metadata};
//!
//! fn main() -> early_rnn::Result<()> {
//!     let batch = generate_synthetic_batch(16, 24, 1, 3, 7);
//!
//!     let mut model = DualOutputRnn::new(DualOutputConfig::new(1, 16, 3).with_seed(7))?;
//!     let out = model.early_loss_linear(&batch.inputs, &batch.targets, 0.5, 0.0)?;
//!
//!     let predictions = model.predict(out.logprobabilities.view(), out.pts.view())?;
//!     println!("loss {:.4}, predictions {}", out.loss, predictions);
//!
//!     model.save("model.pth", Metadata::new())?;
//!     Ok(())
//! }
//! ```

pub mod data;
pub mod error;
pub mod halting;
pub mod losses;
pub mod model;
pub mod predict;
pub mod snapshot;
pub mod utils;

pub use error::{EarlyRnnError, Result};
pub use halting::{entropy, halting_distribution, survival_mass};
pub use losses::{ClassificationTerm, LossKind, LossOutput, LossStats};
pub use model::{DualOutputConfig, DualOutputRnn, EncoderKind, ForwardOutput, SequenceEncoder};
pub use predict::predict;
pub use snapshot::{MetaValue, Metadata, Snapshot};
