use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DockerError {
    #[error("docker CLI not found, install it from https://docs.docker.com/get-docker/")]
    NotFound { source: std::io::Error },

    #[error("docker command failed: {args:?}\n{stderr}")]
    CommandFailed { args: Vec<String>, stderr: String },

    #[error("docker output was not valid UTF-8")]
    InvalidUtf8 { source: std::string::FromUtf8Error },
}

/// Failures of the operations the build engine performs on images.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("path is not valid UTF-8: {0}")]
    InvalidPath(PathBuf),

    #[error("failed to build image {tag}")]
    Build { tag: String, source: DockerError },

    #[error("failed to create container from image {image}")]
    Create { image: String, source: DockerError },

    #[error("failed to copy {src} out of image {image}")]
    Copy {
        image: String,
        src: String,
        source: DockerError,
    },

    #[error("failed to prepare copy destination {path}")]
    Destination {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("container run in image {image} failed")]
    Run { image: String, source: DockerError },
}
