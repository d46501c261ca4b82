//! Dependency installation on the host or inside a container.

use funcraft_core::{
    BuildSettings, FunctionBuildTarget, FunctionResource, ServiceResource, Stage,
};
use funcraft_docker::{ContainerError, ContainerRuntime, Mount};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::conversion::GENERATED_DOCKERFILE;
use crate::taskflow;

/// Where the artifact directory is mounted for container installs.
const CONTAINER_CODE_DIR: &str = "/code";

/// Everything an installer needs to produce one function's artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallRequest {
    pub service_name: String,
    pub service: ServiceResource,
    pub function_name: String,
    pub function: FunctionResource,
    pub base_dir: PathBuf,
    pub source_dir: PathBuf,
    pub artifact_dir: PathBuf,
    pub verbose: bool,
    pub stages: Vec<Stage>,
    /// Image built from the function's Funfile, if any
    pub image: Option<String>,
}

impl InstallRequest {
    pub fn new(
        target: &FunctionBuildTarget,
        base_dir: &Path,
        artifact_dir: &Path,
        verbose: bool,
        stages: &[Stage],
    ) -> Self {
        Self {
            service_name: target.service_name.clone(),
            service: target.service.clone(),
            function_name: target.function_name.clone(),
            function: target.function.clone(),
            base_dir: base_dir.to_path_buf(),
            source_dir: target.source_dir(base_dir),
            artifact_dir: artifact_dir.to_path_buf(),
            verbose,
            stages: stages.to_vec(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: Option<String>) -> Self {
        self.image = image;
        self
    }
}

/// Installs a function's dependencies into its artifact directory.
///
/// Production code uses [`RuntimeInstaller`], tests use mockall-generated mocks.
#[allow(async_fn_in_trait)]
pub trait DependencyInstaller: Send + Sync {
    async fn install_in_process(&self, request: &InstallRequest) -> Result<(), InstallError>;

    async fn install_in_container(&self, request: &InstallRequest) -> Result<(), InstallError>;
}

/// Runs the detected task flows' install commands.
pub struct RuntimeInstaller<'a, C: ContainerRuntime> {
    runtime: &'a C,
    settings: &'a BuildSettings,
}

impl<'a, C: ContainerRuntime> RuntimeInstaller<'a, C> {
    pub fn new(runtime: &'a C, settings: &'a BuildSettings) -> Self {
        Self { runtime, settings }
    }
}

impl<C: ContainerRuntime> DependencyInstaller for RuntimeInstaller<'_, C> {
    async fn install_in_process(&self, request: &InstallRequest) -> Result<(), InstallError> {
        copy_source_tree(&request.source_dir, &request.artifact_dir)?;

        let flows = taskflow::detect_task_flows(&request.function.runtime, &request.source_dir);
        for script in taskflow::install_scripts(&flows) {
            tracing::info!(
                function = %format!("{}/{}", request.service_name, request.function_name),
                script,
                "installing dependencies on host"
            );
            run_host_script(script, &request.artifact_dir, request.verbose).await?;
        }
        Ok(())
    }

    async fn install_in_container(&self, request: &InstallRequest) -> Result<(), InstallError> {
        // A Funfile image has already populated the artifact directory
        if request.image.is_none() {
            copy_source_tree(&request.source_dir, &request.artifact_dir)?;
        }

        let flows = taskflow::detect_task_flows(&request.function.runtime, &request.source_dir);
        let scripts = taskflow::install_scripts(&flows);
        if scripts.is_empty() {
            return Ok(());
        }

        let image = request.image.clone().unwrap_or_else(|| {
            self.settings
                .build_image(request.function.runtime.as_str())
        });
        tracing::info!(
            function = %format!("{}/{}", request.service_name, request.function_name),
            image = %image,
            "installing dependencies in container"
        );

        self.runtime
            .run_container(
                &image,
                &[Mount::new(&request.artifact_dir, CONTAINER_CODE_DIR)],
                CONTAINER_CODE_DIR,
                &scripts.join(" && "),
            )
            .await
            .map_err(|e| InstallError::Container { source: e })
    }
}

/// Copies `source` into `dest`, leaving out funcraft state and `dest` itself.
///
/// No-op when both are the same directory (install-only runs).
pub fn copy_source_tree(source: &Path, dest: &Path) -> Result<(), InstallError> {
    if source == dest {
        return Ok(());
    }

    let walker = WalkDir::new(source).min_depth(1).into_iter().filter_entry(|e| {
        let path = e.path();
        let name = e.file_name().to_string_lossy();
        !(path.starts_with(dest)
            || (e.depth() == 1 && name == ".fun")
            || name == GENERATED_DOCKERFILE)
    });

    for entry in walker {
        let entry = entry.map_err(|e| InstallError::Walk {
            path: source.to_path_buf(),
            source: e,
        })?;
        let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());
        let target = dest.join(relative);
        let io_err = |e: std::io::Error| InstallError::Copy {
            path: entry.path().to_path_buf(),
            source: e,
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            std::fs::create_dir_all(&target).map_err(io_err)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target).map_err(io_err)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
            std::fs::copy(entry.path(), &target).map_err(io_err)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> std::io::Result<()> {
    let link = std::fs::read_link(src)?;
    if dst.symlink_metadata().is_ok() {
        std::fs::remove_file(dst)?;
    }
    std::os::unix::fs::symlink(link, dst)
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::copy(src, dst).map(|_| ())
}

async fn run_host_script(script: &str, dir: &Path, verbose: bool) -> Result<(), InstallError> {
    use std::process::Stdio;

    let mut cmd = tokio::process::Command::new("sh");
    cmd.arg("-c").arg(script).current_dir(dir);

    let failed = |detail: String| InstallError::ScriptFailed {
        script: script.to_owned(),
        detail,
    };

    if verbose {
        let status = cmd
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| InstallError::Spawn { source: e })?;
        if !status.success() {
            return Err(failed(format!("exit code: {status}")));
        }
    } else {
        let output = cmd
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| InstallError::Spawn { source: e })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failed(stderr.trim().to_owned()));
        }
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("failed to walk source directory {path}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },
    #[error("failed to copy {path} into the artifact directory")]
    Copy {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to start shell for dependency install")]
    Spawn { source: std::io::Error },
    #[error("`{script}` failed: {detail}")]
    ScriptFailed { script: String, detail: String },
    #[error("container install failed")]
    Container { source: ContainerError },
}
