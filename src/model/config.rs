//! Configuration of the dual-output network

use crate::error::{EarlyRnnError, Result};
use serde::{Deserialize, Serialize};

/// Compute device, resolved once when the model is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// Host memory, ndarray kernels
    #[default]
    Cpu,
    /// Accelerator request; no accelerator backend is compiled in
    Cuda,
}

/// Recurrent strategy used as sequence encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EncoderKind {
    #[default]
    Lstm,
    Gru,
}

/// Normal initialization of the decision head bias
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiasInit {
    pub mean: f64,
    pub std: f64,
}

impl Default for BiasInit {
    fn default() -> Self {
        // a strongly negative logit keeps sigmoid(p) near zero at start
        Self {
            mean: -10.0,
            std: 0.1,
        }
    }
}

/// Configuration of [`DualOutputRnn`](super::DualOutputRnn)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DualOutputConfig {
    /// Number of input features per timestep
    pub input_dim: usize,
    /// Size of the hidden state
    pub hidden_dim: usize,
    /// Number of classes
    pub nclasses: usize,
    /// Number of stacked recurrent layers
    pub num_rnn_layers: usize,
    /// Dropout between recurrent layers
    pub dropout: f64,
    /// Recurrent cell type
    pub encoder: EncoderKind,
    /// Seed for weight initialization and dropout masks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Compute device
    pub device: Device,
    /// Decision head bias initialization
    pub decision_bias: BiasInit,
}

impl DualOutputConfig {
    /// Creates a configuration with default depth, dropout and encoder
    ///
    /// # Arguments
    ///
    /// * `input_dim` - Number of input features
    /// * `hidden_dim` - Size of the hidden state
    /// * `nclasses` - Number of classes
    pub fn new(input_dim: usize, hidden_dim: usize, nclasses: usize) -> Self {
        Self {
            input_dim,
            hidden_dim,
            nclasses,
            num_rnn_layers: 1,
            dropout: 0.2,
            encoder: EncoderKind::Lstm,
            decision_bias: BiasInit::default(),
            seed: None,
            device: Device::Cpu,
        }
    }

    /// Sets the number of recurrent layers
    pub fn with_layers(mut self, num_rnn_layers: usize) -> Self {
        self.num_rnn_layers = num_rnn_layers;
        self
    }

    /// Sets the dropout between recurrent layers
    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    /// Selects the recurrent encoder
    pub fn with_encoder(mut self, encoder: EncoderKind) -> Self {
        self.encoder = encoder;
        self
    }

    /// Sets the decision bias initialization
    pub fn with_decision_bias(mut self, mean: f64, std: f64) -> Self {
        self.decision_bias = BiasInit { mean, std };
        self
    }

    /// Fixes the random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the compute device
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Checks that the configuration describes a buildable model
    pub fn validate(&self) -> Result<()> {
        if self.input_dim == 0 {
            return Err(EarlyRnnError::InvalidConfig("input_dim must be > 0".into()));
        }
        if self.hidden_dim == 0 {
            return Err(EarlyRnnError::InvalidConfig("hidden_dim must be > 0".into()));
        }
        if self.nclasses == 0 {
            return Err(EarlyRnnError::InvalidConfig("nclasses must be > 0".into()));
        }
        if self.num_rnn_layers == 0 {
            return Err(EarlyRnnError::InvalidConfig(
                "num_rnn_layers must be > 0".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(EarlyRnnError::InvalidConfig(format!(
                "dropout must be within [0, 1), got {}",
                self.dropout
            )));
        }
        if !self.decision_bias.mean.is_finite()
            || !self.decision_bias.std.is_finite()
            || self.decision_bias.std < 0.0
        {
            return Err(EarlyRnnError::InvalidConfig(format!(
                "invalid decision bias init {:?}",
                self.decision_bias
            )));
        }
        if self.device != Device::Cpu {
            return Err(EarlyRnnError::UnsupportedDevice(format!("{:?}", self.device)));
        }
        Ok(())
    }
}

impl Default for DualOutputConfig {
    fn default() -> Self {
        Self::new(1, 3, 5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = DualOutputConfig::new(2, 64, 4)
            .with_layers(2)
            .with_dropout(0.3)
            .with_encoder(EncoderKind::Gru)
            .with_decision_bias(-5.0, 0.0)
            .with_seed(7);

        assert_eq!(config.input_dim, 2);
        assert_eq!(config.hidden_dim, 64);
        assert_eq!(config.nclasses, 4);
        assert_eq!(config.num_rnn_layers, 2);
        assert_eq!(config.dropout, 0.3);
        assert_eq!(config.encoder, EncoderKind::Gru);
        assert_eq!(config.decision_bias.mean, -5.0);
        assert_eq!(config.seed, Some(7));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let config = DualOutputConfig::default();
        assert_eq!(config.input_dim, 1);
        assert_eq!(config.hidden_dim, 3);
        assert_eq!(config.nclasses, 5);
        assert_eq!(config.decision_bias, BiasInit { mean: -10.0, std: 0.1 });
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(DualOutputConfig::new(0, 3, 2).validate().is_err());
        assert!(DualOutputConfig::new(1, 3, 2).with_dropout(1.0).validate().is_err());
        assert!(DualOutputConfig::new(1, 3, 2).with_layers(0).validate().is_err());
        assert!(matches!(
            DualOutputConfig::new(1, 3, 2).with_device(Device::Cuda).validate(),
            Err(EarlyRnnError::UnsupportedDevice(_))
        ));
    }
}
