//! Evaluation metrics for early classification

use crate::error::{EarlyRnnError, Result};
use crate::predict::decision_times;
use ndarray::{ArrayView1, ArrayView2};

/// Share of sequences whose predicted class matches the label
pub fn accuracy(predictions: ArrayView1<usize>, labels: ArrayView1<usize>) -> Result<f64> {
    if predictions.len() != labels.len() {
        return Err(EarlyRnnError::dims("labels", predictions.len(), labels.len()));
    }
    if predictions.is_empty() {
        return Ok(0.0);
    }
    let correct = predictions
        .iter()
        .zip(labels.iter())
        .filter(|(p, l)| p == l)
        .count();
    Ok(correct as f64 / predictions.len() as f64)
}

/// Mean index of the most likely decision timestep
pub fn mean_decision_time(pts: ArrayView2<f64>) -> f64 {
    let times = decision_times(pts);
    if times.is_empty() {
        return 0.0;
    }
    times.iter().sum::<usize>() as f64 / times.len() as f64
}

/// Mean fraction of each sequence observed before deciding, in (0, 1]
pub fn relative_earliness(pts: ArrayView2<f64>) -> f64 {
    let t = pts.ncols();
    if t == 0 || pts.nrows() == 0 {
        return 0.0;
    }
    (mean_decision_time(pts) + 1.0) / t as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_accuracy() {
        let acc = accuracy(array![0, 1, 2, 1].view(), array![0, 1, 1, 1].view()).unwrap();
        assert_abs_diff_eq!(acc, 0.75);
        assert!(accuracy(array![0].view(), array![0, 1].view()).is_err());
    }

    #[test]
    fn test_decision_time_metrics() {
        let pts = array![[0.5, 0.25, 0.125, 0.125], [0.0, 0.1, 0.2, 0.7]];
        assert_abs_diff_eq!(mean_decision_time(pts.view()), 1.5);
        assert_abs_diff_eq!(relative_earliness(pts.view()), 2.5 / 4.0);
    }
}
