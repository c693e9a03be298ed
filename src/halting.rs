//! Halting distribution over decision timesteps
//!
//! The decision head yields `p[t]`, the probability of stopping at `t`
//! given that no earlier step stopped. Scanning `t = 0..T` each step
//! claims `p[t]` of the still unspent survival mass `S[t]`:
//!
//! ```text
//! S[0]   = 1
//! P[t]   = p[t] * S[t]        t < T-1
//! S[t+1] = S[t] - P[t]
//! P[T-1] = S[T-1]             last step absorbs the remainder
//! ```
//!
//! so every row of `P` is a probability mass function over `0..T`.

use crate::error::{EarlyRnnError, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, Axis, Zip};

/// Builds the halting distribution `P` [batch, time] from decision
/// probabilities `p` [batch, time]
///
/// # Example
///
/// ```
/// use early_rnn::halting::halting_distribution;
/// use ndarray::array;
///
/// let p = array![[0.5, 0.5, 0.5, 0.9]];
/// let pts = halting_distribution(p.view()).unwrap();
/// assert_eq!(pts, array![[0.5, 0.25, 0.125, 0.125]]);
/// ```
pub fn halting_distribution(proba_dec: ArrayView2<f64>) -> Result<Array2<f64>> {
    validate(&proba_dec)?;

    let mut pts = Array2::zeros(proba_dec.raw_dim());
    Zip::from(proba_dec.rows())
        .and(pts.rows_mut())
        .for_each(|p, out| {
            scan(p, out, None);
        });
    Ok(pts)
}

/// Survival mass `S` [batch, time + 1]: probability that no decision was
/// made before step `t`, with `S[T] = 0`
pub fn survival_mass(proba_dec: ArrayView2<f64>) -> Result<Array2<f64>> {
    validate(&proba_dec)?;

    let (b, t) = proba_dec.dim();
    let mut pts = Array2::zeros((b, t));
    let mut survival = Array2::zeros((b, t + 1));
    Zip::from(proba_dec.rows())
        .and(pts.rows_mut())
        .and(survival.rows_mut())
        .for_each(|p, out, s| {
            scan(p, out, Some(s));
        });
    Ok(survival)
}

/// Entropy of each halting row, `-sum_t P[t] ln P[t]` with `0 ln 0 = 0`
pub fn entropy(pts: ArrayView2<f64>) -> Array1<f64> {
    pts.map_axis(Axis(1), |row| {
        row.iter()
            .filter(|&&p| p > 0.0)
            .map(|&p| -p * p.ln())
            .sum::<f64>()
    })
}

fn validate(proba_dec: &ArrayView2<f64>) -> Result<()> {
    let (b, t) = proba_dec.dim();
    if b == 0 || t == 0 {
        return Err(EarlyRnnError::dims(
            "decision probabilities",
            "non-empty [batch, time]",
            [b, t],
        ));
    }
    if proba_dec.iter().any(|p| !p.is_finite()) {
        return Err(EarlyRnnError::NonFinite("decision probabilities"));
    }
    if let Some(((batch, time), &value)) = proba_dec
        .indexed_iter()
        .find(|(_, &p)| !(0.0..=1.0).contains(&p))
    {
        return Err(EarlyRnnError::InvalidProbability { batch, time, value });
    }
    Ok(())
}

/// Sequential scan over one row; step `t` depends on step `t - 1`
fn scan(p: ArrayView1<f64>, mut pts: ArrayViewMut1<f64>, mut survival: Option<ArrayViewMut1<f64>>) {
    let last = p.len() - 1;
    let mut remaining = 1.0_f64;

    for (t, &p_t) in p.iter().enumerate() {
        if let Some(s) = survival.as_mut() {
            s[t] = remaining;
        }
        if t < last {
            pts[t] = p_t * remaining;
            // S - p S without cancellation for p near 1, clamped against drift
            remaining = (remaining * (1.0 - p_t)).clamp(0.0, 1.0);
        } else {
            pts[t] = remaining;
        }
    }

    if let Some(s) = survival.as_mut() {
        s[last + 1] = 0.0;
    }
}
