//! Sequence encoder contract
//!
//! An encoder maps a batch `[batch, time, input]` to hidden states
//! `[batch, time, hidden]` of the same length. Batch rows never interact
//! and the state at step `t` only depends on steps `0..=t`.

use super::params::NamedParameters;
use crate::error::{EarlyRnnError, Result};
use ndarray::Array3;
use rand::rngs::StdRng;
use rand::Rng;
use std::fmt::Debug;

/// Replaceable sequence-to-sequence transform in front of the heads
pub trait SequenceEncoder: Debug {
    fn input_size(&self) -> usize;

    fn hidden_size(&self) -> usize;

    fn num_layers(&self) -> usize;

    /// Encodes `x`; `rng` is `Some` in training mode and drives dropout
    fn forward(&self, x: &Array3<f64>, rng: Option<&mut StdRng>) -> Result<Array3<f64>>;

    /// Appends all parameters to `out` under `prefix`
    fn export(&self, prefix: &str, out: &mut NamedParameters);

    /// Restores all parameters from `source`
    fn restore(&mut self, prefix: &str, source: &NamedParameters) -> Result<()>;
}

/// Rejects inputs whose feature size differs from the encoder's
pub(crate) fn check_input(x: &Array3<f64>, input_size: usize) -> Result<()> {
    let (b, t, d) = x.dim();
    if d != input_size {
        return Err(EarlyRnnError::dims(
            "encoder input features",
            input_size,
            d,
        ));
    }
    if b == 0 || t == 0 {
        return Err(EarlyRnnError::dims(
            "encoder input",
            "non-empty [batch, time, features]",
            [b, t, d],
        ));
    }
    Ok(())
}

/// Inverted dropout applied to a layer output in place
pub(crate) fn dropout(x: &mut Array3<f64>, rate: f64, rng: &mut StdRng) {
    if rate <= 0.0 {
        return;
    }
    let keep = 1.0 - rate;
    x.mapv_inplace(|v| if rng.gen::<f64>() < keep { v / keep } else { 0.0 });
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_dropout_scales_kept_units() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut x = Array3::from_elem((4, 8, 16), 1.0);
        dropout(&mut x, 0.5, &mut rng);

        assert!(x.iter().all(|&v| v == 0.0 || (v - 2.0).abs() < 1e-12));
        let kept = x.iter().filter(|&&v| v > 0.0).count();
        assert!(kept > 0 && kept < x.len());
    }

    #[test]
    fn test_dropout_zero_rate_is_identity() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut x = Array3::from_elem((2, 3, 4), 0.7);
        dropout(&mut x, 0.0, &mut rng);
        assert!(x.iter().all(|&v| v == 0.7));
    }

    #[test]
    fn test_check_input() {
        let x = Array3::<f64>::zeros((2, 5, 3));
        assert!(check_input(&x, 3).is_ok());
        assert!(check_input(&x, 4).is_err());
        assert!(check_input(&Array3::<f64>::zeros((0, 5, 3)), 3).is_err());
    }
}
