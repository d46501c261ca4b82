//! Core types and configuration for funcraft.
//!
//! This crate defines the deployment template model ([`Template`]), the
//! per-function build target resolved from it ([`FunctionBuildTarget`]),
//! the build invocation ([`BuildRun`]), the optional `funcraft.toml` schema
//! ([`FuncraftConfig`]), and shared error types.

pub mod config;
pub mod error;
pub mod resource;
pub mod run;
pub mod template;

pub use config::{BuildSettings, FuncraftConfig, check_relative_dir};
pub use error::{Error, Result};
pub use resource::{
    FunctionBuildTarget, FunctionResource, MountPoint, NasConfig, Runtime, RuntimeFamily,
    ServiceResource,
};
pub use run::{BuildRun, Stage};
pub use template::{RewriteSummary, Template};
