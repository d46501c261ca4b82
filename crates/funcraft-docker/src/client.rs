use crate::docker::ContainerError;
use crate::executor::{DockerExecutor, RealExecutor};
use crate::runtime::ContainerRuntime;
use std::path::{Path, PathBuf};

/// A bind mount for [`ContainerRuntime::run_container`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub host: PathBuf,
    pub container: String,
}

impl Mount {
    pub fn new(host: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
        }
    }
}

/// Docker operations client, parameterized over the executor for testability.
pub struct DockerClient<E: DockerExecutor = RealExecutor> {
    executor: E,
}

impl DockerClient<RealExecutor> {
    pub fn new() -> Self {
        Self {
            executor: RealExecutor,
        }
    }
}

impl Default for DockerClient<RealExecutor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: DockerExecutor> DockerClient<E> {
    pub fn with_executor(executor: E) -> Self {
        Self { executor }
    }

    async fn remove_container(&self, container_id: &str) {
        if let Err(e) = self
            .executor
            .exec(&args(["rm", "--force", container_id]))
            .await
        {
            tracing::warn!(
                container = container_id,
                error = %e,
                "failed to remove helper container"
            );
        }
    }
}

impl<E: DockerExecutor> ContainerRuntime for DockerClient<E> {
    async fn build_image(
        &self,
        context_dir: &Path,
        dockerfile: &Path,
        tag: &str,
    ) -> Result<String, ContainerError> {
        let context = path_str(context_dir)?;
        let file = path_str(dockerfile)?;

        self.executor
            .exec_streaming(&args(["build", "--tag", tag, "--file", file, context]))
            .await
            .map_err(|e| ContainerError::Build {
                tag: tag.to_owned(),
                source: e,
            })?;

        Ok(tag.to_owned())
    }

    async fn copy_from_image(
        &self,
        image: &str,
        src: &str,
        dest: &Path,
    ) -> Result<(), ContainerError> {
        std::fs::create_dir_all(dest).map_err(|e| ContainerError::Destination {
            path: dest.to_path_buf(),
            source: e,
        })?;
        let dest_str = path_str(dest)?;

        let container_id = self
            .executor
            .exec(&args(["create", image]))
            .await
            .map_err(|e| ContainerError::Create {
                image: image.to_owned(),
                source: e,
            })?;
        let container_id = container_id.trim();

        let source = format!("{container_id}:{}", docker_cp_source(src));
        let copied = self
            .executor
            .exec(&args(["cp", &source, dest_str]))
            .await;

        // Helper container goes away whether or not the copy succeeded
        self.remove_container(container_id).await;

        copied.map(|_| ()).map_err(|e| ContainerError::Copy {
            image: image.to_owned(),
            src: src.to_owned(),
            source: e,
        })
    }

    async fn run_container(
        &self,
        image: &str,
        mounts: &[Mount],
        workdir: &str,
        script: &str,
    ) -> Result<(), ContainerError> {
        let mut cmd = args(["run", "--rm"]);
        for mount in mounts {
            let host = path_str(&mount.host)?;
            cmd.push("--volume".to_owned());
            cmd.push(format!("{host}:{}", mount.container));
        }
        cmd.extend(args(["--workdir", workdir, image, "sh", "-c", script]));

        self.executor
            .exec_streaming(&cmd)
            .await
            .map_err(|e| ContainerError::Run {
                image: image.to_owned(),
                source: e,
            })
    }
}

/// `docker cp` copies directory contents only for a `/.` suffix.
fn docker_cp_source(src: &str) -> String {
    if src.ends_with("/.") {
        src.to_owned()
    } else if src.ends_with('/') {
        format!("{src}.")
    } else {
        src.to_owned()
    }
}

fn path_str(path: &Path) -> Result<&str, ContainerError> {
    path.to_str()
        .ok_or_else(|| ContainerError::InvalidPath(path.to_path_buf()))
}

fn args<const N: usize>(a: [&str; N]) -> Vec<String> {
    a.iter().map(|s| (*s).to_owned()).collect()
}
