//! Build metadata ledger (`meta.json`) for incremental builds.
//!
//! Records the modification time of every function's dependency manifests
//! plus the template, together with the options of the run that produced
//! the artifacts. Deciding whether a later build can be skipped is left to
//! the caller comparing against a fresh [`BuildMetadata`].

use funcraft_core::{BuildRun, FunctionBuildTarget};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::taskflow;

/// File name of the metadata record inside the root artifact directory.
pub const META_FILE: &str = "meta.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOpts {
    pub use_docker: bool,
    pub verbose: bool,
    pub build_name: Option<String>,
}

impl From<&BuildRun> for BuildOpts {
    fn from(run: &BuildRun) -> Self {
        Self {
            use_docker: run.use_docker,
            verbose: run.verbose,
            build_name: run.build_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildMetadata {
    /// Path → modification time in milliseconds since the Unix epoch
    pub modified_timestamps: BTreeMap<String, u64>,
    pub build_opts: BuildOpts,
}

impl BuildMetadata {
    pub fn load(meta_path: &Path) -> Result<Self, MetadataError> {
        let content = std::fs::read_to_string(meta_path).map_err(|e| MetadataError::Read {
            path: meta_path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| MetadataError::Parse {
            path: meta_path.to_path_buf(),
            source: e,
        })
    }
}

/// Manifest files of every target, followed by the template path.
pub fn collect_manifest_paths(
    targets: &[FunctionBuildTarget],
    base_dir: &Path,
    template_path: &Path,
) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = targets
        .iter()
        .flat_map(|t| taskflow::detect_task_flows(t.runtime(), &t.source_dir(base_dir)))
        .filter_map(|flow| flow.manifest_path().map(Path::to_path_buf))
        .collect();
    paths.push(template_path.to_path_buf());
    paths
}

/// Writes the mtimes of `paths` and `opts` to `meta_path`.
///
/// Paths that no longer exist are left out of the record.
pub fn record_timestamps(
    paths: &[PathBuf],
    opts: BuildOpts,
    meta_path: &Path,
) -> Result<BuildMetadata, MetadataError> {
    let mut modified_timestamps = BTreeMap::new();

    for path in paths {
        let modified = match std::fs::metadata(path).and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(
                    path = %path.display(),
                    "manifest vanished before metadata was recorded"
                );
                continue;
            }
            Err(e) => {
                return Err(MetadataError::Stat {
                    path: path.clone(),
                    source: e,
                });
            }
        };
        let millis = match modified.duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_millis().min(u128::from(u64::MAX)) as u64,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "mtime before epoch");
                0
            }
        };
        modified_timestamps.insert(path.display().to_string(), millis);
    }

    let metadata = BuildMetadata {
        modified_timestamps,
        build_opts: opts,
    };

    let content = serde_json::to_string_pretty(&metadata)
        .map_err(|e| MetadataError::Serialize { source: e })?;
    std::fs::write(meta_path, content).map_err(|e| MetadataError::Write {
        path: meta_path.to_path_buf(),
        source: e,
    })?;

    Ok(metadata)
}

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("failed to stat {path}")]
    Stat {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize build metadata")]
    Serialize { source: serde_json::Error },
    #[error("failed to write build metadata to {path}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read build metadata from {path}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse build metadata at {path}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}
