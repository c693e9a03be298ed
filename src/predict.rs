//! Class prediction at the most likely halting time

use crate::error::{EarlyRnnError, Result};
use ndarray::{s, Array1, ArrayView1, ArrayView2, ArrayView3, Axis};

/// Index of the first maximum; NaN entries never win
fn argmax(values: ArrayView1<f64>) -> usize {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (idx, &value) in values.iter().enumerate() {
        if value > best_value {
            best = idx;
            best_value = value;
        }
    }
    best
}

/// Most likely decision timestep per sequence, `argmax_t P[t]`
pub fn decision_times(pts: ArrayView2<f64>) -> Array1<usize> {
    pts.map_axis(Axis(1), argmax)
}

/// Predicted class per sequence at its most likely decision time
///
/// # Arguments
///
/// * `logprobabilities` - Class log-probabilities [batch, time, classes]
/// * `pts` - Halting distribution [batch, time]
pub fn predict(logprobabilities: ArrayView3<f64>, pts: ArrayView2<f64>) -> Result<Array1<usize>> {
    let (b, t, c) = logprobabilities.dim();
    if pts.dim() != (b, t) {
        return Err(EarlyRnnError::dims("halting distribution", [b, t], pts.shape()));
    }
    if t == 0 || c == 0 {
        return Err(EarlyRnnError::dims(
            "log-probabilities",
            "non-empty time and class axes",
            [b, t, c],
        ));
    }

    let predictions = decision_times(pts)
        .iter()
        .enumerate()
        .map(|(batch, &time)| argmax(logprobabilities.slice(s![batch, time, ..])))
        .collect();
    Ok(predictions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2, Array3};

    #[test]
    fn test_predicts_class_at_halting_peak() {
        let mut logp = Array3::from_elem((2, 4, 3), -5.0);
        // sequence 0 peaks at t=2 where class 1 leads
        logp[[0, 2, 1]] = -0.1;
        logp[[0, 0, 2]] = -0.01;
        // sequence 1 peaks at t=0 where class 0 leads
        logp[[1, 0, 0]] = -0.2;
        logp[[1, 3, 2]] = -0.01;

        let pts = array![[0.1, 0.2, 0.6, 0.1], [0.7, 0.1, 0.1, 0.1]];
        let predictions = predict(logp.view(), pts.view()).unwrap();
        assert_eq!(predictions, array![1, 0]);
    }

    #[test]
    fn test_ties_take_earliest() {
        assert_eq!(decision_times(array![[0.4, 0.4, 0.2]].view()), array![0]);

        let logp = array![[[-1.0, -1.0], [-3.0, -0.1]]];
        let pts = array![[0.5, 0.5]];
        assert_eq!(predict(logp.view(), pts.view()).unwrap(), array![0]);
    }

    #[test]
    fn test_is_idempotent() {
        let logp = Array3::from_shape_fn((3, 5, 4), |(b, t, c)| -(((b * 7 + t * 3 + c) % 5) as f64));
        let pts = Array2::from_shape_fn((3, 5), |(b, t)| ((b + t) % 4) as f64 / 10.0);

        let first = predict(logp.view(), pts.view()).unwrap();
        let second = predict(logp.view(), pts.view()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_shape_mismatch() {
        let logp = Array3::<f64>::zeros((2, 4, 3));
        assert!(predict(logp.view(), Array2::zeros((2, 3)).view()).is_err());
    }
}
