//! NAS mount resolution and post-build NAS output synchronization.

use funcraft_core::NasConfig;
use funcraft_docker::ContainerRuntime;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Mount directory used for `NasConfig: Auto`.
const AUTO_MOUNT_DIR: &str = "/mnt/auto";

/// A local staging directory paired with a NAS directory inside an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NasMapping {
    pub local_nas_dir: PathBuf,
    pub remote_nas_dir: String,
}

/// Resolves a service's NAS configuration into local/remote directory pairs.
///
/// Local directories live under `<base_dir>/<default_nas_dir>`: `auto-default/<service>`
/// for `Auto`, `<host>/<export path>` for explicit mount points.
pub fn resolve_mappings(
    base_dir: &Path,
    default_nas_dir: &str,
    nas_config: &NasConfig,
    service_name: &str,
) -> Vec<NasMapping> {
    let nas_root = base_dir.join(default_nas_dir);

    match nas_config {
        NasConfig::Auto => vec![NasMapping {
            local_nas_dir: nas_root.join("auto-default").join(service_name),
            remote_nas_dir: AUTO_MOUNT_DIR.to_owned(),
        }],
        NasConfig::Manual { mount_points, .. } => mount_points
            .iter()
            .map(|mp| {
                let (host, path) = mp.host_and_path();
                let mut local = nas_root.join(host);
                local.extend(path.split('/').filter(|s| !s.is_empty() && *s != ".."));
                NasMapping {
                    local_nas_dir: local,
                    remote_nas_dir: mp.mount_dir.clone(),
                }
            })
            .collect(),
    }
}

/// What a [`NasSynchronizer::synchronize`] call did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct NasSyncReport {
    /// In-place NAS output was moved to the root NAS folder
    pub consolidated: bool,
    /// Remote directories copied successfully
    pub copied: Vec<String>,
    /// Remote directories whose copy failed (logged, not fatal)
    pub failed: Vec<String>,
}

pub struct NasSynchronizer<'a, C: ContainerRuntime> {
    runtime: &'a C,
    /// Well-known subpath of installer NAS output inside an artifact directory
    nas_subpath: &'a str,
}

impl<'a, C: ContainerRuntime> NasSynchronizer<'a, C> {
    pub fn new(runtime: &'a C, nas_subpath: &'a str) -> Self {
        Self {
            runtime,
            nas_subpath,
        }
    }

    /// Consolidates in-place NAS output, then pulls each mapping out of `image`.
    ///
    /// A failed mapping copy is logged and does not stop later mappings.
    pub async fn synchronize(
        &self,
        mappings: &[NasMapping],
        image: &str,
        root_artifacts_dir: &Path,
        func_artifact_dir: &Path,
    ) -> Result<NasSyncReport, NasError> {
        let mut report = NasSyncReport::default();

        let func_nas = func_artifact_dir.join(self.nas_subpath);
        let root_nas = root_artifacts_dir.join(self.nas_subpath);
        if func_nas != root_nas && func_nas.is_dir() {
            tracing::info!(
                from = %func_nas.display(),
                to = %root_nas.display(),
                "moving function NAS output to shared NAS folder"
            );
            move_contents(&func_nas, &root_nas)?;
            report.consolidated = true;
        }

        for mapping in mappings {
            let mut remote = mapping.remote_nas_dir.clone();
            if !remote.ends_with('/') {
                remote.push('/');
            }

            match self
                .runtime
                .copy_from_image(image, &remote, &mapping.local_nas_dir)
                .await
            {
                Ok(()) => report.copied.push(remote),
                Err(e) => {
                    tracing::warn!(
                        remote = %remote,
                        local = %mapping.local_nas_dir.display(),
                        error = %e,
                        "failed to copy NAS directory out of image; continuing"
                    );
                    report.failed.push(remote);
                }
            }
        }

        Ok(report)
    }
}

/// Moves everything under `src` into `dst` (merging), then removes `src`.
fn move_contents(src: &Path, dst: &Path) -> Result<(), NasError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| NasError::Move { path, source }
    };

    std::fs::create_dir_all(dst).map_err(io_err(dst))?;

    let entries: Vec<walkdir::DirEntry> = WalkDir::new(src)
        .min_depth(1)
        .into_iter()
        .collect::<Result<_, _>>()
        .map_err(|e| NasError::Walk {
            path: src.to_path_buf(),
            source: e,
        })?;

    for entry in &entries {
        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(io_err(&target))?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(io_err(parent))?;
            }
            if let Err(e) = std::fs::rename(entry.path(), &target) {
                tracing::debug!(
                    path = %entry.path().display(),
                    error = %e,
                    "rename failed, copying instead"
                );
                std::fs::copy(entry.path(), &target).map_err(io_err(entry.path()))?;
            }
        }
    }

    std::fs::remove_dir_all(src).map_err(io_err(src))
}

#[derive(Debug, thiserror::Error)]
pub enum NasError {
    #[error("failed to move NAS output at {path}")]
    Move {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to walk NAS output at {path}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },
}
