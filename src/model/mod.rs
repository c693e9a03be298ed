//! # Dual-output recurrent model
//!
//! Sequence encoder, per-channel normalization and the two heads
//! (classification and decision) of the early classifier.
//!
//! ## Example
//!
//! ```rust,no_run
//! use early_rnn::model::{DualOutputConfig, DualOutputRnn, EncoderKind};
//! use ndarray::Array3;
//!
//! let config = DualOutputConfig::new(1, 32, 5)
//!     .with_layers(2)
//!     .with_encoder(EncoderKind::Lstm)
//!     .with_seed(42);
//!
//! let mut model = DualOutputRnn::new(config)?;
//! model.eval();
//! let (logits, pts) = model.forward(&Array3::zeros((8, 20, 1)))?;
//! # Ok::<(), early_rnn::EarlyRnnError>(())
//! ```

mod config;
mod encoder;
mod gru;
mod layers;
mod lstm;
mod network;
mod norm;
mod params;

pub use config::{BiasInit, Device, DualOutputConfig, EncoderKind};
pub use encoder::SequenceEncoder;
pub use gru::{GruCell, GruEncoder};
pub use layers::{sigmoid, Linear};
pub use lstm::{LstmCell, LstmEncoder};
pub use network::{DualOutputRnn, ForwardOutput};
pub use norm::BatchNorm;
pub use params::{check_compatible, NamedParameters};
