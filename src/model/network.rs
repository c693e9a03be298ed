//! Dual-output recurrent network
//!
//! ```text
//! x [B,T,D] -> encoder [B,T,H] -> batch norm -> linear_class [B,T,C]
//!                                            -> linear_dec   [B,T,1] -> sigmoid -> halting [B,T]
//! ```

use super::config::{DualOutputConfig, EncoderKind};
use super::encoder::SequenceEncoder;
use super::gru::GruEncoder;
use super::layers::{sigmoid, Linear};
use super::lstm::LstmEncoder;
use super::norm::BatchNorm;
use super::params::{check_compatible, NamedParameters};
use crate::error::{EarlyRnnError, Result};
use crate::halting::halting_distribution;
use crate::losses::{self, LossKind, LossOutput, LossStats};
use crate::predict;
use crate::snapshot::{Metadata, Snapshot};
use ndarray::{Array1, Array2, Array3, ArrayView2, ArrayView3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use tracing::{debug, info};

/// Result of a forward pass
#[derive(Debug, Clone)]
pub struct ForwardOutput {
    /// Class logits [batch, time, classes]
    pub logits: Array3<f64>,
    /// Per-step decision probabilities [batch, time]
    pub proba_dec: Array2<f64>,
    /// Halting distribution [batch, time]
    pub pts: Array2<f64>,
}

/// Early classification model with a class head and a decision head
#[derive(Debug)]
pub struct DualOutputRnn {
    pub config: DualOutputConfig,
    encoder: Box<dyn SequenceEncoder>,
    bn: BatchNorm,
    linear_class: Linear,
    linear_dec: Linear,
    training: bool,
    rng: StdRng,
}

impl DualOutputRnn {
    /// Builds the model with the encoder selected in `config`
    pub fn new(config: DualOutputConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let encoder: Box<dyn SequenceEncoder> = match config.encoder {
            EncoderKind::Lstm => Box::new(LstmEncoder::new(
                config.input_dim,
                config.hidden_dim,
                config.num_rnn_layers,
                config.dropout,
                &mut rng,
            )),
            EncoderKind::Gru => Box::new(GruEncoder::new(
                config.input_dim,
                config.hidden_dim,
                config.num_rnn_layers,
                config.dropout,
                &mut rng,
            )),
        };

        Self::assemble(config, encoder, rng)
    }

    /// Builds the model around a custom encoder
    pub fn with_encoder(config: DualOutputConfig, encoder: Box<dyn SequenceEncoder>) -> Result<Self> {
        config.validate()?;
        if encoder.input_size() != config.input_dim || encoder.hidden_size() != config.hidden_dim {
            return Err(EarlyRnnError::dims(
                "encoder [input, hidden]",
                [config.input_dim, config.hidden_dim],
                [encoder.input_size(), encoder.hidden_size()],
            ));
        }
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::assemble(config, encoder, rng)
    }

    fn assemble(config: DualOutputConfig, encoder: Box<dyn SequenceEncoder>, mut rng: StdRng) -> Result<Self> {
        let bn = BatchNorm::new(config.hidden_dim);
        let linear_class = Linear::new(config.hidden_dim, config.nclasses, &mut rng);
        let mut linear_dec = Linear::new(config.hidden_dim, 1, &mut rng);
        linear_dec.init_bias_normal(config.decision_bias.mean, config.decision_bias.std, &mut rng);

        debug!(
            input_dim = config.input_dim,
            hidden_dim = config.hidden_dim,
            nclasses = config.nclasses,
            layers = encoder.num_layers(),
            "built dual-output model"
        );

        Ok(Self {
            config,
            encoder,
            bn,
            linear_class,
            linear_dec,
            training: true,
            rng,
        })
    }

    /// Switches to training mode: batch statistics and dropout
    pub fn train(&mut self) {
        self.training = true;
    }

    /// Switches to inference mode: frozen statistics, no dropout
    pub fn eval(&mut self) {
        self.training = false;
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    pub fn nclasses(&self) -> usize {
        self.config.nclasses
    }

    /// Full forward pass
    pub fn forward_detailed(&mut self, x: &Array3<f64>) -> Result<ForwardOutput> {
        let (b, t, d) = x.dim();
        if d != self.config.input_dim || b == 0 || t == 0 {
            return Err(EarlyRnnError::dims(
                "inputs [batch, time, features]",
                format!("[>0, >0, {}]", self.config.input_dim),
                [b, t, d],
            ));
        }

        let rng = if self.training { Some(&mut self.rng) } else { None };
        let hidden = self.encoder.forward(x, rng)?;
        let normalized = self.bn.forward(&hidden, self.training)?;

        let h = self.config.hidden_dim;
        let flat = normalized
            .into_shape((b * t, h))
            .map_err(|_| EarlyRnnError::dims("normalized hidden", [b * t, h], "non-contiguous"))?;

        let logits = self
            .linear_class
            .forward(&flat)
            .into_shape((b, t, self.config.nclasses))
            .map_err(|_| EarlyRnnError::dims("class logits", [b, t, self.config.nclasses], b * t))?;

        let proba_dec = self
            .linear_dec
            .forward(&flat)
            .mapv(sigmoid)
            .into_shape((b, t))
            .map_err(|_| EarlyRnnError::dims("decision logits", [b, t], b * t))?;

        let pts = halting_distribution(proba_dec.view())?;
        debug!(batch = b, time = t, training = self.training, "forward");

        Ok(ForwardOutput {
            logits,
            proba_dec,
            pts,
        })
    }

    /// Forward pass returning class logits [B,T,C] and halting distribution [B,T]
    pub fn forward(&mut self, x: &Array3<f64>) -> Result<(Array3<f64>, Array2<f64>)> {
        let out = self.forward_detailed(x)?;
        Ok((out.logits, out.pts))
    }

    /// Linear `1 - p(target)` loss weighted by halting, plus earliness
    pub fn early_loss_linear(
        &mut self,
        inputs: &Array3<f64>,
        targets: &Array2<usize>,
        alpha: f64,
        entropy_factor: f64,
    ) -> Result<LossOutput> {
        self.loss(LossKind::EarlyLinear, inputs, targets, alpha, entropy_factor)
    }

    /// Uniform cross-entropy plus earliness
    pub fn early_loss_cross_entropy(
        &mut self,
        inputs: &Array3<f64>,
        targets: &Array2<usize>,
        alpha: f64,
        entropy_factor: f64,
    ) -> Result<LossOutput> {
        self.loss(LossKind::EarlyCrossEntropy, inputs, targets, alpha, entropy_factor)
    }

    /// Plain cross-entropy, for pretraining without the decision head
    pub fn loss_cross_entropy(
        &mut self,
        inputs: &Array3<f64>,
        targets: &Array2<usize>,
        entropy_factor: f64,
    ) -> Result<LossOutput> {
        self.loss(LossKind::CrossEntropy, inputs, targets, 0.0, entropy_factor)
    }

    /// Runs the forward pass and the selected loss
    ///
    /// `alpha` is ignored by [`LossKind::CrossEntropy`].
    pub fn loss(
        &mut self,
        kind: LossKind,
        inputs: &Array3<f64>,
        targets: &Array2<usize>,
        alpha: f64,
        entropy_factor: f64,
    ) -> Result<LossOutput> {
        let (b, t, _) = inputs.dim();
        if targets.dim() != (b, t) {
            return Err(EarlyRnnError::dims("targets", [b, t], targets.shape()));
        }
        if kind != LossKind::CrossEntropy && !(alpha.is_finite() && (0.0..=1.0).contains(&alpha)) {
            return Err(EarlyRnnError::InvalidAlpha(alpha));
        }
        if !entropy_factor.is_finite() {
            return Err(EarlyRnnError::InvalidEntropyFactor(entropy_factor));
        }

        let (logits, pts) = self.forward(inputs)?;
        let logprobabilities = losses::log_softmax(logits.view());

        let stats: LossStats = match kind {
            LossKind::EarlyLinear => losses::early_loss_linear(
                logprobabilities.view(),
                targets.view(),
                pts.view(),
                alpha,
                entropy_factor,
            )?,
            LossKind::EarlyCrossEntropy => losses::early_loss_cross_entropy(
                logprobabilities.view(),
                targets.view(),
                pts.view(),
                alpha,
                entropy_factor,
            )?,
            LossKind::CrossEntropy => losses::loss_cross_entropy(
                logprobabilities.view(),
                targets.view(),
                pts.view(),
                entropy_factor,
            )?,
        };

        Ok(LossOutput {
            loss: stats.loss,
            logprobabilities,
            pts,
            stats,
        })
    }

    /// Predicted class per sequence at its most likely halting time
    pub fn predict(&self, logprobabilities: ArrayView3<f64>, pts: ArrayView2<f64>) -> Result<Array1<usize>> {
        predict::predict(logprobabilities, pts)
    }

    /// All parameters and running statistics by name
    pub fn named_parameters(&self) -> NamedParameters {
        let mut out = NamedParameters::new();
        self.encoder.export("encoder", &mut out);
        self.bn.export("bn", &mut out);
        self.linear_class.export("linear_class", &mut out);
        self.linear_dec.export("linear_dec", &mut out);
        out
    }

    /// Replaces every parameter; nothing is changed unless the whole map
    /// matches the model's names and shapes
    pub fn load_named_parameters(&mut self, params: &NamedParameters) -> Result<()> {
        check_compatible(&self.named_parameters(), params)?;

        self.encoder.restore("encoder", params)?;
        self.bn.restore("bn", params)?;
        self.linear_class.restore("linear_class", params)?;
        self.linear_dec.restore("linear_dec", params)
    }

    /// Saves parameters and `metadata` as one snapshot
    pub fn save<P: AsRef<Path>>(&self, path: P, metadata: Metadata) -> Result<()> {
        info!(path = %path.as_ref().display(), "saving model");
        Snapshot::new(self.named_parameters(), metadata)?.save(path)
    }

    /// Restores parameters from a snapshot and returns its metadata
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<Metadata> {
        info!(path = %path.as_ref().display(), "loading model");
        let snapshot = Snapshot::load(path)?;
        self.load_named_parameters(&snapshot.model_state)?;
        Ok(snapshot.metadata)
    }
}
