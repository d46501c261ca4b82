//! Root and per-function artifact directories.
//!
//! A `build` run isolates output under `<base>/<artifacts_dir>/<service>/<function>`.
//! An install-only run has no isolation: the base directory is the root and
//! each function's source directory is its artifact directory.

use funcraft_core::{BuildSettings, FunctionBuildTarget, Stage, check_relative_dir};
use std::path::{Path, PathBuf};

pub struct ArtifactDirectoryManager<'a> {
    settings: &'a BuildSettings,
}

impl<'a> ArtifactDirectoryManager<'a> {
    pub fn new(settings: &'a BuildSettings) -> Self {
        Self { settings }
    }

    /// Prepares the root artifact directory for a run.
    pub fn resolve_root_artifacts_dir(
        &self,
        base_dir: &Path,
        stages: &[Stage],
    ) -> Result<PathBuf, ArtifactError> {
        if !stages.contains(&Stage::Build) {
            return Ok(base_dir.to_path_buf());
        }

        let artifacts_dir = &self.settings.artifacts_dir;
        check_relative_dir(artifacts_dir).map_err(|reason| ArtifactError::InvalidDir {
            path: artifacts_dir.clone(),
            reason,
        })?;

        let root = base_dir.join(artifacts_dir);
        clean_dir(&root)?;
        Ok(root)
    }

    /// Location of a function's artifact directory. Touches nothing on disk.
    pub fn function_artifacts_dir(
        &self,
        root: &Path,
        base_dir: &Path,
        target: &FunctionBuildTarget,
        stages: &[Stage],
    ) -> PathBuf {
        if stages.contains(&Stage::Build) {
            root.join(&target.service_name).join(&target.function_name)
        } else {
            target.source_dir(base_dir)
        }
    }

    /// Returns a function's artifact directory, emptied for `build` runs.
    ///
    /// Must run before anything writes into the directory.
    pub fn resolve_function_artifacts_dir(
        &self,
        root: &Path,
        base_dir: &Path,
        target: &FunctionBuildTarget,
        stages: &[Stage],
    ) -> Result<PathBuf, ArtifactError> {
        let dir = self.function_artifacts_dir(root, base_dir, target, stages);
        if stages.contains(&Stage::Build) {
            for name in [&target.service_name, &target.function_name] {
                check_relative_dir(name).map_err(|reason| ArtifactError::InvalidDir {
                    path: name.clone(),
                    reason,
                })?;
            }
            clean_dir(&dir)?;
        }
        Ok(dir)
    }
}

/// Removes `dir` if present and recreates it empty.
pub fn clean_dir(dir: &Path) -> Result<(), ArtifactError> {
    if dir.exists() {
        std::fs::remove_dir_all(dir).map_err(|e| ArtifactError::Clean {
            path: dir.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::create_dir_all(dir).map_err(|e| ArtifactError::Create {
        path: dir.to_path_buf(),
        source: e,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("artifact directory {path:?} {reason}")]
    InvalidDir { path: String, reason: &'static str },
    #[error("failed to clean artifact directory {path}")]
    Clean {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to create artifact directory {path}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
}
