//! Loss functions for early classification
//!
//! All variants consume log-probabilities `[batch, time, classes]`,
//! integer targets `[batch, time]` and the halting distribution
//! `[batch, time]`. The earliness-aware variants blend a classification
//! term with the expected relative decision time `E_P[t / T]`:
//!
//! ```text
//! L = alpha * L_classification + (1 - alpha) * L_earliness
//! ```

use crate::error::{EarlyRnnError, Result};
use crate::halting::entropy;
use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis, Zip};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Training objective selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LossKind {
    /// Halting-weighted `1 - p(target)` plus earliness
    #[default]
    EarlyLinear,
    /// Uniform cross-entropy plus earliness
    EarlyCrossEntropy,
    /// Uniform cross-entropy only
    CrossEntropy,
}

/// How the classification component of an early loss is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationTerm {
    /// `mean_b sum_t P[t] * (1 - p_t(target))`
    HaltingWeightedLinear,
    /// NLL of the target averaged over all `(batch, time)` pairs,
    /// independent of the halting distribution
    UniformCrossEntropy,
}

/// Scalar loss values reported by every loss call
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LossStats {
    pub loss: f64,
    /// Classification component, absent for plain cross-entropy
    pub loss_classification: Option<f64>,
    /// Earliness component, absent for plain cross-entropy
    pub loss_earliness: Option<f64>,
}

/// Everything a loss call produces
#[derive(Debug, Clone)]
pub struct LossOutput {
    pub loss: f64,
    /// Log-probabilities [batch, time, classes]
    pub logprobabilities: Array3<f64>,
    /// Halting distribution [batch, time]
    pub pts: Array2<f64>,
    pub stats: LossStats,
}

/// Numerically stable log-softmax over the class axis
pub fn log_softmax(logits: ArrayView3<f64>) -> Array3<f64> {
    let mut out = logits.to_owned();
    for mut lane in out.lanes_mut(Axis(2)) {
        let max = lane.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        let log_sum = lane.iter().map(|&v| (v - max).exp()).sum::<f64>().ln() + max;
        lane.mapv_inplace(|v| v - log_sum);
    }
    out
}

/// Log-probability of the target class at every `(batch, time)` pair
pub fn target_logprobabilities(
    logprobabilities: ArrayView3<f64>,
    targets: ArrayView2<usize>,
) -> Result<Array2<f64>> {
    let (b, t, c) = logprobabilities.dim();
    if targets.dim() != (b, t) {
        return Err(EarlyRnnError::dims("targets", [b, t], targets.shape()));
    }

    let mut picked = Array2::zeros((b, t));
    for ((batch, time), &target) in targets.indexed_iter() {
        if target >= c {
            return Err(EarlyRnnError::InvalidTarget {
                batch,
                time,
                target,
                nclasses: c,
            });
        }
        picked[[batch, time]] = logprobabilities[[batch, time, target]];
    }
    Ok(picked)
}

/// Negative log-likelihood averaged over every `(batch, time)` pair
pub fn nll_loss(logprobabilities: ArrayView3<f64>, targets: ArrayView2<usize>) -> Result<f64> {
    let picked = target_logprobabilities(logprobabilities, targets)?;
    Ok(-mean(&picked))
}

/// Expected relative decision time `mean_b sum_t P[t] * t / T`
pub fn earliness(pts: ArrayView2<f64>) -> f64 {
    let (b, t) = pts.dim();
    if b == 0 || t == 0 {
        return 0.0;
    }
    let total: f64 = pts
        .indexed_iter()
        .map(|((_, time), &p)| p * time as f64 / t as f64)
        .sum();
    total / b as f64
}

/// Halting-weighted miss probability `mean_b sum_t P[t] * (1 - p_t(target))`
fn halting_weighted_miss(target_logp: ArrayView2<f64>, pts: ArrayView2<f64>) -> f64 {
    let b = pts.nrows().max(1);
    let mut total = 0.0;
    Zip::from(&target_logp).and(&pts).for_each(|&logp, &p| {
        total += p * (1.0 - logp.exp());
    });
    total / b as f64
}

/// Mean halting entropy over the batch
pub fn mean_entropy(pts: ArrayView2<f64>) -> f64 {
    entropy(pts).mean().unwrap_or(0.0)
}

/// Earliness-aware loss with an explicit classification strategy
pub fn early_loss(
    logprobabilities: ArrayView3<f64>,
    targets: ArrayView2<usize>,
    pts: ArrayView2<f64>,
    alpha: f64,
    entropy_factor: f64,
    term: ClassificationTerm,
) -> Result<LossStats> {
    check_alpha(alpha)?;
    check_entropy_factor(entropy_factor)?;
    check_pts(logprobabilities, pts)?;

    let target_logp = target_logprobabilities(logprobabilities, targets)?;

    let loss_earliness = earliness(pts);
    let loss_classification = match term {
        ClassificationTerm::HaltingWeightedLinear => halting_weighted_miss(target_logp.view(), pts),
        ClassificationTerm::UniformCrossEntropy => -mean(&target_logp),
    };

    let mut loss = alpha * loss_classification + (1.0 - alpha) * loss_earliness;
    loss = apply_entropy(loss, pts, entropy_factor);

    debug!(
        loss,
        loss_classification, loss_earliness, alpha, entropy_factor, "early loss"
    );

    let stats = LossStats {
        loss,
        loss_classification: Some(loss_classification),
        loss_earliness: Some(loss_earliness),
    };
    check_stats(&stats, entropy_factor)?;
    Ok(stats)
}

/// `1 - p(target)` classification weighted by the halting distribution,
/// plus earliness
pub fn early_loss_linear(
    logprobabilities: ArrayView3<f64>,
    targets: ArrayView2<usize>,
    pts: ArrayView2<f64>,
    alpha: f64,
    entropy_factor: f64,
) -> Result<LossStats> {
    early_loss(
        logprobabilities,
        targets,
        pts,
        alpha,
        entropy_factor,
        ClassificationTerm::HaltingWeightedLinear,
    )
}

/// Cross-entropy over all timesteps (not halting-weighted), plus earliness
pub fn early_loss_cross_entropy(
    logprobabilities: ArrayView3<f64>,
    targets: ArrayView2<usize>,
    pts: ArrayView2<f64>,
    alpha: f64,
    entropy_factor: f64,
) -> Result<LossStats> {
    early_loss(
        logprobabilities,
        targets,
        pts,
        alpha,
        entropy_factor,
        ClassificationTerm::UniformCrossEntropy,
    )
}

/// Plain cross-entropy over all timesteps
///
/// The halting distribution only enters through the optional entropy
/// term; with `entropy_factor == 0` the result does not depend on `pts`.
pub fn loss_cross_entropy(
    logprobabilities: ArrayView3<f64>,
    targets: ArrayView2<usize>,
    pts: ArrayView2<f64>,
    entropy_factor: f64,
) -> Result<LossStats> {
    check_entropy_factor(entropy_factor)?;

    let mut loss = nll_loss(logprobabilities, targets)?;
    if entropy_factor != 0.0 {
        check_pts(logprobabilities, pts)?;
        loss = apply_entropy(loss, pts, entropy_factor);
    }

    let stats = LossStats {
        loss,
        ..LossStats::default()
    };
    check_stats(&stats, entropy_factor)?;
    Ok(stats)
}

fn apply_entropy(loss: f64, pts: ArrayView2<f64>, entropy_factor: f64) -> f64 {
    if entropy_factor == 0.0 {
        loss
    } else {
        loss - entropy_factor * mean_entropy(pts)
    }
}

fn mean(values: &Array2<f64>) -> f64 {
    values.mean().unwrap_or(0.0)
}

fn check_alpha(alpha: f64) -> Result<()> {
    if alpha.is_finite() && (0.0..=1.0).contains(&alpha) {
        Ok(())
    } else {
        Err(EarlyRnnError::InvalidAlpha(alpha))
    }
}

fn check_entropy_factor(entropy_factor: f64) -> Result<()> {
    if entropy_factor.is_finite() {
        Ok(())
    } else {
        Err(EarlyRnnError::InvalidEntropyFactor(entropy_factor))
    }
}

fn check_pts(logprobabilities: ArrayView3<f64>, pts: ArrayView2<f64>) -> Result<()> {
    let (b, t, _) = logprobabilities.dim();
    if pts.dim() != (b, t) {
        return Err(EarlyRnnError::dims("halting distribution", [b, t], pts.shape()));
    }
    if pts.iter().any(|p| !p.is_finite()) {
        return Err(EarlyRnnError::NonFinite("halting distribution"));
    }
    Ok(())
}

fn check_stats(stats: &LossStats, entropy_factor: f64) -> Result<()> {
    let check = |value: f64, what: &'static str| {
        if value.is_finite() {
            Ok(())
        } else {
            if entropy_factor != 0.0 {
                warn!(entropy_factor, "non-finite {} with entropy regularization", what);
            }
            Err(EarlyRnnError::NonFinite(what))
        }
    };

    if let Some(value) = stats.loss_classification {
        check(value, "classification loss")?;
    }
    if let Some(value) = stats.loss_earliness {
        check(value, "earliness loss")?;
    }
    check(stats.loss, "loss")
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array3};

    /// B=1, T=2, C=2 with p(target) = 0.5 at t=0 and 0.8 at t=1
    fn fixture() -> (Array3<f64>, Array2<usize>, Array2<f64>) {
        let logp = array![[[0.5f64.ln(), 0.5f64.ln()], [0.2f64.ln(), 0.8f64.ln()]]];
        let targets = array![[1usize, 1]];
        let pts = array![[0.25, 0.75]];
        (logp, targets, pts)
    }

    #[test]
    fn test_log_softmax_normalizes() {
        let logits = array![[[1.0, 2.0, 3.0], [1000.0, 1000.0, -1000.0]]];
        let logp = log_softmax(logits.view());

        for lane in logp.lanes(Axis(2)) {
            let total: f64 = lane.iter().map(|v| v.exp()).sum();
            assert_abs_diff_eq!(total, 1.0, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(logp[[0, 1, 0]], 0.5f64.ln(), epsilon = 1e-12);
        assert!(logp.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_nll_loss() {
        let (logp, targets, _) = fixture();
        let loss = nll_loss(logp.view(), targets.view()).unwrap();
        assert_abs_diff_eq!(loss, -(0.5f64.ln() + 0.8f64.ln()) / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_early_loss_linear_components() {
        let (logp, targets, pts) = fixture();
        let stats = early_loss_linear(logp.view(), targets.view(), pts.view(), 0.6, 0.0).unwrap();

        let classification = 0.25 * 0.5 + 0.75 * 0.2;
        let earliness = 0.75 * 0.5;
        assert_abs_diff_eq!(stats.loss_classification.unwrap(), classification, epsilon = 1e-12);
        assert_abs_diff_eq!(stats.loss_earliness.unwrap(), earliness, epsilon = 1e-12);
        assert_abs_diff_eq!(stats.loss, 0.6 * classification + 0.4 * earliness, epsilon = 1e-12);
    }

    #[test]
    fn test_early_cross_entropy_ignores_halting_for_classification() {
        let (logp, targets, pts) = fixture();
        let a = early_loss_cross_entropy(logp.view(), targets.view(), pts.view(), 0.5, 0.0).unwrap();
        let b = early_loss_cross_entropy(
            logp.view(),
            targets.view(),
            array![[1.0, 0.0]].view(),
            0.5,
            0.0,
        )
        .unwrap();

        assert_eq!(a.loss_classification, b.loss_classification);
        assert_ne!(a.loss_earliness, b.loss_earliness);
        assert_abs_diff_eq!(
            a.loss_classification.unwrap(),
            nll_loss(logp.view(), targets.view()).unwrap(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_cross_entropy_is_invariant_to_halting() {
        let (logp, targets, pts) = fixture();
        let a = loss_cross_entropy(logp.view(), targets.view(), pts.view(), 0.0).unwrap();
        let b = loss_cross_entropy(logp.view(), targets.view(), array![[0.9, 0.1]].view(), 0.0)
            .unwrap();

        assert_eq!(a, b);
        assert_eq!(a.loss_classification, None);
        assert_eq!(a.loss_earliness, None);
    }

    #[test]
    fn test_entropy_regularization() {
        let (logp, targets, _) = fixture();
        let uniform = array![[0.5, 0.5]];
        let plain = early_loss_linear(logp.view(), targets.view(), uniform.view(), 0.5, 0.0).unwrap();
        let reg = early_loss_linear(logp.view(), targets.view(), uniform.view(), 0.5, 0.1).unwrap();
        assert_abs_diff_eq!(reg.loss, plain.loss - 0.1 * 2.0f64.ln(), epsilon = 1e-12);

        // one-hot halting has zero entropy, so the term vanishes
        let one_hot = array![[1.0, 0.0]];
        let a = early_loss_linear(logp.view(), targets.view(), one_hot.view(), 0.5, 0.0).unwrap();
        let b = early_loss_linear(logp.view(), targets.view(), one_hot.view(), 0.5, 0.3).unwrap();
        assert_abs_diff_eq!(a.loss, b.loss, epsilon = 1e-15);
    }

    #[test]
    fn test_alpha_validation() {
        let (logp, targets, pts) = fixture();
        for alpha in [-0.1, 1.1, f64::NAN] {
            assert!(matches!(
                early_loss_linear(logp.view(), targets.view(), pts.view(), alpha, 0.0),
                Err(EarlyRnnError::InvalidAlpha(_))
            ));
        }
        assert!(early_loss_linear(logp.view(), targets.view(), pts.view(), 0.0, 0.0).is_ok());
        assert!(early_loss_linear(logp.view(), targets.view(), pts.view(), 1.0, 0.0).is_ok());
    }

    #[test]
    fn test_shape_and_target_validation() {
        let (logp, targets, _) = fixture();
        assert!(matches!(
            early_loss_linear(logp.view(), targets.view(), array![[1.0]].view(), 0.5, 0.0),
            Err(EarlyRnnError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            nll_loss(logp.view(), array![[0usize, 2]].view()),
            Err(EarlyRnnError::InvalidTarget { target: 2, .. })
        ));
        assert!(matches!(
            early_loss_linear(logp.view(), targets.view(), array![[f64::NAN, 1.0]].view(), 0.5, 0.0),
            Err(EarlyRnnError::NonFinite(_))
        ));
    }

    #[test]
    fn test_non_finite_loss_is_reported() {
        let logp = array![[[f64::NEG_INFINITY, 0.0]]];
        let err = loss_cross_entropy(logp.view(), array![[0usize]].view(), array![[1.0]].view(), 0.0)
            .unwrap_err();
        assert!(matches!(err, EarlyRnnError::NonFinite("loss")));
    }

    #[test]
    fn test_earliness() {
        assert_abs_diff_eq!(
            earliness(array![[0.5, 0.25, 0.125, 0.125], [0.0, 0.0, 0.0, 1.0]].view()),
            (0.25 * 0.25 + 0.125 * 0.5 + 0.125 * 0.75 + 0.75) / 2.0,
            epsilon = 1e-12
        );
    }
}
