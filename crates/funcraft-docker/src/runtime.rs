use crate::client::Mount;
use crate::docker::ContainerError;
use std::path::Path;

/// Image build and layer access as consumed by the build engine.
#[allow(async_fn_in_trait)]
pub trait ContainerRuntime: Send + Sync {
    /// Builds `dockerfile` with `context_dir` as build context and returns the image id.
    async fn build_image(
        &self,
        context_dir: &Path,
        dockerfile: &Path,
        tag: &str,
    ) -> Result<String, ContainerError>;

    /// Copies `src` from the image filesystem into `dest`.
    ///
    /// A `src` ending in `/.` or `/` copies directory contents. Fails with
    /// [`ContainerError::Copy`] if `src` does not exist in the image.
    async fn copy_from_image(
        &self,
        image: &str,
        src: &str,
        dest: &Path,
    ) -> Result<(), ContainerError>;

    /// Runs `script` with `sh -c` in a throwaway container.
    async fn run_container(
        &self,
        image: &str,
        mounts: &[Mount],
        workdir: &str,
        script: &str,
    ) -> Result<(), ContainerError>;
}
