//! Affine projection and activation helpers

use super::params::{self, NamedParameters};
use crate::error::Result;
use ndarray::{Array1, Array2, ArrayBase, Data, Ix2};
use ndarray_rand::rand_distr::{Normal, Uniform};
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;

/// Fully connected layer `y = x W^T + b`
#[derive(Debug, Clone)]
pub struct Linear {
    /// Weights [out_features, in_features]
    pub weight: Array2<f64>,
    /// Bias [out_features]
    pub bias: Array1<f64>,
}

impl Linear {
    /// Creates a layer with fan-in uniform initialization
    pub fn new(in_features: usize, out_features: usize, rng: &mut StdRng) -> Self {
        let limit = (1.0 / in_features as f64).sqrt();
        let dist = Uniform::new_inclusive(-limit, limit);

        Self {
            weight: Array2::random_using((out_features, in_features), dist, rng),
            bias: Array1::random_using(out_features, dist, rng),
        }
    }

    /// Replaces the bias with samples from `Normal(mean, std)`
    pub fn init_bias_normal(&mut self, mean: f64, std: f64, rng: &mut StdRng) {
        match Normal::new(mean, std) {
            Ok(dist) => self.bias = Array1::random_using(self.bias.len(), dist, rng),
            // negative or non-finite std: constant bias
            Err(_) => self.bias.fill(mean),
        }
    }

    pub fn in_features(&self) -> usize {
        self.weight.ncols()
    }

    pub fn out_features(&self) -> usize {
        self.weight.nrows()
    }

    /// Projects a batch of rows [n, in_features] to [n, out_features]
    pub fn forward<S: Data<Elem = f64>>(&self, x: &ArrayBase<S, Ix2>) -> Array2<f64> {
        x.dot(&self.weight.t()) + &self.bias
    }

    pub(crate) fn export(&self, prefix: &str, out: &mut NamedParameters) {
        params::export(out, prefix, "weight", &self.weight);
        params::export(out, prefix, "bias", &self.bias);
    }

    pub(crate) fn restore(&mut self, prefix: &str, source: &NamedParameters) -> Result<()> {
        params::restore(source, prefix, "weight", &mut self.weight)?;
        params::restore(source, prefix, "bias", &mut self.bias)
    }
}

/// Logistic sigmoid without overflow for large |x|
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use rand::SeedableRng;

    #[test]
    fn test_linear_forward() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut layer = Linear::new(2, 3, &mut rng);
        layer.weight = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        layer.bias = array![0.5, -0.5, 0.0];

        let y = layer.forward(&array![[1.0, 2.0], [3.0, 4.0]]);
        assert_eq!(y, array![[1.5, 1.5, 3.0], [3.5, 3.5, 7.0]]);
    }

    #[test]
    fn test_bias_init() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut layer = Linear::new(4, 1, &mut rng);
        layer.init_bias_normal(-10.0, 0.1, &mut rng);
        assert!((layer.bias[0] + 10.0).abs() < 1.0);

        layer.init_bias_normal(-3.0, 0.0, &mut rng);
        assert_eq!(layer.bias[0], -3.0);
    }

    #[test]
    fn test_sigmoid() {
        assert_abs_diff_eq!(sigmoid(0.0), 0.5, epsilon = 1e-12);
        assert!(sigmoid(-800.0) >= 0.0);
        assert!(sigmoid(800.0) <= 1.0);
        assert_abs_diff_eq!(sigmoid(2.0) + sigmoid(-2.0), 1.0, epsilon = 1e-12);
    }
}
