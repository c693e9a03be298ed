//! Named parameter maps shared by all model components

use crate::error::{EarlyRnnError, Result};
use ndarray::{Array, ArrayD, Dimension};
use std::collections::BTreeMap;

/// Ordered mapping from parameter name to tensor
pub type NamedParameters = BTreeMap<String, ArrayD<f64>>;

/// Joins a component prefix and a local parameter name
pub(crate) fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

/// Exports a tensor under `prefix.name`
pub(crate) fn export<D: Dimension>(
    out: &mut NamedParameters,
    prefix: &str,
    name: &str,
    value: &Array<f64, D>,
) {
    out.insert(join(prefix, name), value.clone().into_dyn());
}

/// Overwrites `target` with the tensor stored under `prefix.name`
pub(crate) fn restore<D: Dimension>(
    params: &NamedParameters,
    prefix: &str,
    name: &str,
    target: &mut Array<f64, D>,
) -> Result<()> {
    let key = join(prefix, name);
    let value = params
        .get(&key)
        .ok_or_else(|| EarlyRnnError::MissingParameter(key.clone()))?;

    if value.shape() != target.shape() {
        return Err(EarlyRnnError::ShapeMismatch {
            name: key,
            expected: target.shape().to_vec(),
            actual: value.shape().to_vec(),
        });
    }

    let value = value
        .clone()
        .into_dimensionality::<D>()
        .map_err(|_| EarlyRnnError::ShapeMismatch {
            name: key,
            expected: target.shape().to_vec(),
            actual: value.shape().to_vec(),
        })?;
    *target = value;
    Ok(())
}

/// Verifies that `given` holds exactly the names and shapes of `expected`
pub fn check_compatible(expected: &NamedParameters, given: &NamedParameters) -> Result<()> {
    for (name, value) in expected {
        let other = given
            .get(name)
            .ok_or_else(|| EarlyRnnError::MissingParameter(name.clone()))?;
        if other.shape() != value.shape() {
            return Err(EarlyRnnError::ShapeMismatch {
                name: name.clone(),
                expected: value.shape().to_vec(),
                actual: other.shape().to_vec(),
            });
        }
    }

    if let Some(extra) = given.keys().find(|name| !expected.contains_key(*name)) {
        return Err(EarlyRnnError::UnexpectedParameter(extra.clone()));
    }

    Ok(())
}
