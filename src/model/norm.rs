//! Per-channel batch normalization of encoder outputs
//!
//! Statistics are taken over the flattened `batch * time` axis, so each
//! hidden channel is normalized independently of its position in time.

use super::params::{self, NamedParameters};
use crate::error::{EarlyRnnError, Result};
use ndarray::{arr0, Array0, Array1, Array3, Axis};

/// Batch normalization with running statistics
#[derive(Debug, Clone)]
pub struct BatchNorm {
    /// Number of normalized channels
    pub num_features: usize,
    /// Added to the variance before the square root
    pub eps: f64,
    /// Weight of the current batch in the running statistics
    pub momentum: f64,
    /// Affine scale
    pub weight: Array1<f64>,
    /// Affine shift
    pub bias: Array1<f64>,
    pub running_mean: Array1<f64>,
    pub running_var: Array1<f64>,
    pub num_batches_tracked: u64,
}

impl BatchNorm {
    pub fn new(num_features: usize) -> Self {
        Self {
            num_features,
            eps: 1e-5,
            momentum: 0.1,
            weight: Array1::ones(num_features),
            bias: Array1::zeros(num_features),
            running_mean: Array1::zeros(num_features),
            running_var: Array1::ones(num_features),
            num_batches_tracked: 0,
        }
    }

    /// Normalizes `x` [batch, time, channels]
    ///
    /// In training mode the batch statistics are used and folded into the
    /// running statistics; otherwise the running statistics are applied
    /// unchanged.
    pub fn forward(&mut self, x: &Array3<f64>, training: bool) -> Result<Array3<f64>> {
        let (b, t, h) = x.dim();
        if h != self.num_features {
            return Err(EarlyRnnError::dims("normalizer channels", self.num_features, h));
        }

        let n = b * t;
        let flat = x
            .to_shape((n, h))
            .map_err(|_| EarlyRnnError::dims("normalizer input", [b, t, h], x.shape()))?;

        let (mean, var) = if training {
            if n < 2 {
                return Err(EarlyRnnError::dims(
                    "normalizer batch",
                    "more than 1 value per channel in training mode",
                    n,
                ));
            }
            let mean = flat
                .mean_axis(Axis(0))
                .ok_or_else(|| EarlyRnnError::dims("normalizer batch", "n > 0", n))?;
            let var = flat.var_axis(Axis(0), 0.0);
            let unbiased = &var * (n as f64 / (n as f64 - 1.0));

            self.running_mean = &self.running_mean * (1.0 - self.momentum) + &mean * self.momentum;
            self.running_var = &self.running_var * (1.0 - self.momentum) + &unbiased * self.momentum;
            self.num_batches_tracked += 1;

            (mean, var)
        } else {
            (self.running_mean.clone(), self.running_var.clone())
        };

        let inv_std = var.mapv(|v| 1.0 / (v + self.eps).sqrt());
        let normalized = (&flat - &mean) * &inv_std * &self.weight + &self.bias;

        normalized
            .into_shape((b, t, h))
            .map_err(|_| EarlyRnnError::dims("normalizer output", [b, t, h], n * h))
    }

    pub(crate) fn export(&self, prefix: &str, out: &mut NamedParameters) {
        params::export(out, prefix, "weight", &self.weight);
        params::export(out, prefix, "bias", &self.bias);
        params::export(out, prefix, "running_mean", &self.running_mean);
        params::export(out, prefix, "running_var", &self.running_var);
        params::export(
            out,
            prefix,
            "num_batches_tracked",
            &arr0(self.num_batches_tracked as f64),
        );
    }

    pub(crate) fn restore(&mut self, prefix: &str, source: &NamedParameters) -> Result<()> {
        params::restore(source, prefix, "weight", &mut self.weight)?;
        params::restore(source, prefix, "bias", &mut self.bias)?;
        params::restore(source, prefix, "running_mean", &mut self.running_mean)?;
        params::restore(source, prefix, "running_var", &mut self.running_var)?;

        let mut tracked: Array0<f64> = arr0(0.0);
        params::restore(source, prefix, "num_batches_tracked", &mut tracked)?;
        self.num_batches_tracked = tracked.into_scalar().max(0.0) as u64;
        Ok(())
    }
}
