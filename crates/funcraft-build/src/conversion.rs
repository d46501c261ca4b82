//! `fun.yml` → `Funfile` → Dockerfile conversion pipeline.

use funcraft_core::{BuildSettings, Runtime};
use std::path::{Path, PathBuf};

use crate::funfile::{self, ConversionError, DockerfileGenerator, Funfile};

/// Normalized build script file name.
pub const BUILD_SCRIPT: &str = "Funfile";
/// Legacy build descriptor file name.
pub const LEGACY_CONFIG: &str = "fun.yml";
/// Container build script generated next to the Funfile for one build.
pub const GENERATED_DOCKERFILE: &str = ".Funfile.generated.dockerfile";

/// Returns the Funfile of `source_dir`, converting `fun.yml` into one if needed.
///
/// An existing Funfile is never regenerated. `None` means the function has
/// no legacy build config and no container build is mandated.
pub fn resolve_build_script(source_dir: &Path) -> Result<Option<PathBuf>, ConversionError> {
    let funfile_path = source_dir.join(BUILD_SCRIPT);
    if funfile_path.is_file() {
        return Ok(Some(funfile_path));
    }

    let legacy_path = source_dir.join(LEGACY_CONFIG);
    if !legacy_path.is_file() {
        return Ok(None);
    }

    tracing::info!(path = %legacy_path.display(), "converting fun.yml to Funfile");
    let content = funfile::legacy_to_funfile(&legacy_path)?;
    std::fs::write(&funfile_path, content).map_err(|e| ConversionError::Write {
        path: funfile_path.clone(),
        source: e,
    })?;

    Ok(Some(funfile_path))
}

/// Writes the container build script for `funfile_path` next to it.
///
/// The returned guard deletes the file when dropped, so the script never
/// outlives the build step that created it, including on error paths.
pub fn materialize_container_build_script(
    funfile_path: &Path,
    runtime: &Runtime,
    service_name: &str,
    function_name: &str,
    settings: &BuildSettings,
) -> Result<GeneratedFile, ConversionError> {
    let funfile = Funfile::load(funfile_path)?;
    let dockerfile =
        DockerfileGenerator::new(settings, runtime, service_name, function_name).render(&funfile);

    let dir = funfile_path.parent().unwrap_or(Path::new("."));
    let path = dir.join(GENERATED_DOCKERFILE);
    std::fs::write(&path, dockerfile).map_err(|e| ConversionError::Write {
        path: path.clone(),
        source: e,
    })?;
    tracing::debug!(path = %path.display(), "generated container build script");

    Ok(GeneratedFile { path, armed: true })
}

/// A generated file removed when the guard goes out of scope.
#[derive(Debug)]
pub struct GeneratedFile {
    path: PathBuf,
    armed: bool,
}

impl GeneratedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the file now, reporting failures instead of logging them.
    pub fn remove(mut self) -> std::io::Result<()> {
        self.armed = false;
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

impl Drop for GeneratedFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to remove generated file"
            );
        }
    }
}
