//! Group subset artifacts.
//!
//! Each non-empty (model, strategy, norm) group can be saved as
//! `pickle_{model}_{strategy}_norm{norm}`: zstd-compressed JSON holding the
//! unfiltered rows plus where they came from. Writes are atomic (temp file
//! then rename), and a later group with the same name replaces the earlier one.

use crate::schema::{Norm, Strategy};
use crate::table::Sample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// zstd level used for artifacts.
const COMPRESSION_LEVEL: i32 = 3;

/// The saved form of one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSubset {
    pub model: String,
    pub strategy: Strategy,
    pub norm: Norm,
    /// Log file the rows were extracted from.
    pub source: PathBuf,
    pub created: DateTime<Utc>,
    pub samples: Vec<Sample>,
}

/// File name for a group's artifact.
pub fn artifact_name(model: &str, strategy: Strategy, norm: Norm) -> String {
    format!("pickle_{model}_{strategy}_norm{norm}")
}

/// Write `subset` into `dir` under its artifact name and return the final path.
pub fn save_subset(dir: &Path, subset: &PersistedSubset) -> Result<PathBuf, PersistError> {
    let name = artifact_name(&subset.model, subset.strategy, subset.norm);
    let dest = dir.join(&name);

    let json = serde_json::to_vec(subset).map_err(|e| PersistError::Serialize { source: e })?;
    let compressed = zstd::encode_all(json.as_slice(), COMPRESSION_LEVEL)
        .map_err(|e| PersistError::Compress { source: e })?;

    let tmp_path = dir.join(format!(".{name}.tmp.{}", std::process::id()));
    std::fs::write(&tmp_path, compressed).map_err(|e| PersistError::Write {
        path: tmp_path.clone(),
        source: e,
    })?;
    std::fs::rename(&tmp_path, &dest).map_err(|e| PersistError::Rename {
        from: tmp_path,
        to: dest.clone(),
        source: e,
    })?;

    tracing::debug!(
        file = %dest.display(),
        rows = subset.samples.len(),
        "saved group subset"
    );
    Ok(dest)
}

/// Read an artifact written by [`save_subset`].
pub fn load_subset(path: &Path) -> Result<PersistedSubset, PersistError> {
    let compressed = std::fs::read(path).map_err(|e| PersistError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    let json = zstd::decode_all(compressed.as_slice()).map_err(|e| PersistError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_slice(&json).map_err(|e| PersistError::Deserialize {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Errors from artifact operations.
#[derive(Debug)]
pub enum PersistError {
    Serialize {
        source: serde_json::Error,
    },
    Compress {
        source: std::io::Error,
    },
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Deserialize {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl std::fmt::Display for PersistError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistError::Serialize { source } => {
                write!(f, "failed to serialize group subset: {source}")
            }
            PersistError::Compress { source } => {
                write!(f, "failed to compress group subset: {source}")
            }
            PersistError::Write { path, source } => {
                write!(f, "failed to write {}: {source}", path.display())
            }
            PersistError::Rename { from, to, source } => {
                write!(
                    f,
                    "failed to rename {} -> {}: {source}",
                    from.display(),
                    to.display()
                )
            }
            PersistError::Read { path, source } => {
                write!(f, "failed to read artifact {}: {source}", path.display())
            }
            PersistError::Deserialize { path, source } => {
                write!(f, "artifact {} is not a group subset: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for PersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PersistError::Serialize { source } => Some(source),
            PersistError::Compress { source } => Some(source),
            PersistError::Write { source, .. } => Some(source),
            PersistError::Rename { source, .. } => Some(source),
            PersistError::Read { source, .. } => Some(source),
            PersistError::Deserialize { source, .. } => Some(source),
        }
    }
}
