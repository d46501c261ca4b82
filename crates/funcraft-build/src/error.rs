use std::path::PathBuf;

use crate::artifacts::ArtifactError;
use crate::funfile::ConversionError;
use crate::installer::InstallError;
use crate::metadata::MetadataError;
use crate::nas::NasError;
use funcraft_docker::ContainerError;

/// A fatal error that ends a build run.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Core(#[from] funcraft_core::Error),

    #[error("failed to prepare root artifact directory")]
    RootArtifacts(#[source] ArtifactError),

    #[error("failed to build function {service}/{function}")]
    Function {
        service: String,
        function: String,
        source: FunctionError,
    },

    #[error("failed to record build metadata")]
    Metadata(#[from] MetadataError),
}

/// Failure while building a single function.
#[derive(Debug, thiserror::Error)]
pub enum FunctionError {
    #[error("codeUri {0} does not exist")]
    MissingSource(PathBuf),

    #[error("build config conversion failed")]
    Conversion(#[from] ConversionError),

    #[error("container image build failed")]
    ContainerBuild { source: ContainerError },

    #[error("failed to copy function artifact out of image {image}")]
    ArtifactCopy {
        image: String,
        source: ContainerError,
    },

    #[error("failed to prepare artifact directory")]
    ArtifactDir(#[from] ArtifactError),

    #[error("failed to consolidate NAS output")]
    Nas(#[from] NasError),

    #[error("dependency install failed")]
    Install(#[from] InstallError),

    #[error("failed to remove generated file {path}")]
    Cleanup {
        path: PathBuf,
        source: std::io::Error,
    },
}
