//! Container runtime operations for funcraft, backed by the `docker` CLI.
//!
//! [`ContainerRuntime`] is the seam the build engine depends on;
//! [`DockerClient`] implements it over a [`DockerExecutor`] so command
//! construction can be tested without a Docker daemon.

pub mod client;
pub mod docker;
pub mod executor;
pub mod runtime;

pub use client::{DockerClient, Mount};
pub use docker::{ContainerError, DockerError};
pub use executor::{DockerExecutor, RealExecutor};
pub use runtime::ContainerRuntime;
