//! Parameter snapshots
//!
//! A snapshot is one bincode record holding the parameter map under
//! `model_state` next to caller-supplied metadata (epoch, hyperparameters,
//! ...). Files are written to a sibling temporary path and renamed into
//! place, so a reader never sees a partially written snapshot.

use crate::error::{EarlyRnnError, Result};
use crate::model::NamedParameters;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default snapshot location
pub const DEFAULT_SNAPSHOT_PATH: &str = "model.pth";

/// Key under which the parameter map is stored
pub const MODEL_STATE_KEY: &str = "model_state";

/// Auxiliary value stored next to the parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetaValue {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl From<i64> for MetaValue {
    fn from(v: i64) -> Self {
        MetaValue::Int(v)
    }
}

impl From<usize> for MetaValue {
    fn from(v: usize) -> Self {
        MetaValue::Int(v as i64)
    }
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self {
        MetaValue::Float(v)
    }
}

impl From<bool> for MetaValue {
    fn from(v: bool) -> Self {
        MetaValue::Bool(v)
    }
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self {
        MetaValue::Text(v.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(v: String) -> Self {
        MetaValue::Text(v)
    }
}

impl std::fmt::Display for MetaValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetaValue::Int(v) => write!(f, "{}", v),
            MetaValue::Float(v) => write!(f, "{}", v),
            MetaValue::Text(v) => write!(f, "{}", v),
            MetaValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

/// Caller metadata keyed by name
pub type Metadata = BTreeMap<String, MetaValue>;

/// Serialized model state plus metadata
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub model_state: NamedParameters,
    pub metadata: Metadata,
}

impl Snapshot {
    /// Builds a snapshot, rejecting metadata that shadows `model_state`
    pub fn new(model_state: NamedParameters, metadata: Metadata) -> Result<Self> {
        if metadata.contains_key(MODEL_STATE_KEY) {
            return Err(EarlyRnnError::ReservedMetadataKey(MODEL_STATE_KEY.to_string()));
        }
        Ok(Self {
            model_state,
            metadata,
        })
    }

    /// Writes the snapshot atomically to `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let tmp = temp_path(path);

        let written = (|| -> Result<()> {
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            bincode::serialize_into(&mut writer, self)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
            Ok(())
        })();

        if let Err(err) = written.and_then(|_| fs::rename(&tmp, path).map_err(Into::into)) {
            let _ = fs::remove_file(&tmp);
            return Err(err);
        }

        info!(
            path = %path.display(),
            parameters = self.model_state.len(),
            "saved snapshot"
        );
        Ok(())
    }

    /// Reads a snapshot from `path`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let snapshot: Snapshot = bincode::deserialize_from(reader)?;

        if snapshot.metadata.contains_key(MODEL_STATE_KEY) {
            return Err(EarlyRnnError::ReservedMetadataKey(MODEL_STATE_KEY.to_string()));
        }

        debug!(
            path = %path.display(),
            parameters = snapshot.model_state.len(),
            metadata = snapshot.metadata.len(),
            "read snapshot"
        );
        Ok(snapshot)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_SNAPSHOT_PATH.to_string());
    path.with_file_name(format!(".{}.tmp", name))
}
