//! Typed views of the service and function resources in a template.
//!
//! Templates are loosely-typed YAML; these types are produced once, when
//! build targets are resolved, so the rest of the pipeline never re-checks
//! property presence.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Function runtime identifier, e.g. `python3` or `nodejs12`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Runtime(String);

/// Runtime families sharing one dependency toolchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeFamily {
    Nodejs,
    Python,
    Java,
    Php,
    Dotnetcore,
    Custom,
    Other,
}

impl Runtime {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn family(&self) -> RuntimeFamily {
        let id = self.0.as_str();
        if id.starts_with("nodejs") {
            RuntimeFamily::Nodejs
        } else if id.starts_with("python") {
            RuntimeFamily::Python
        } else if id.starts_with("java") {
            RuntimeFamily::Java
        } else if id.starts_with("php") {
            RuntimeFamily::Php
        } else if id.starts_with("dotnetcore") {
            RuntimeFamily::Dotnetcore
        } else if id == "custom" || id.starts_with("custom-") {
            RuntimeFamily::Custom
        } else {
            RuntimeFamily::Other
        }
    }

    /// Runtimes whose deployable unit is a compiled archive (jar/war/zip).
    pub fn is_compiled_archive(&self) -> bool {
        matches!(self.0.as_str(), "java8" | "java11")
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single NAS mount declared on a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountPoint {
    /// `<host>:<path>` of the NAS export
    #[serde(rename = "ServerAddr")]
    pub server_addr: String,
    /// Mount directory inside the function container
    #[serde(rename = "MountDir")]
    pub mount_dir: String,
}

impl MountPoint {
    /// Splits `ServerAddr` into host and export path.
    ///
    /// A missing path component means the export root (`/`).
    pub fn host_and_path(&self) -> (&str, &str) {
        match self.server_addr.split_once(':') {
            Some((host, path)) if !path.is_empty() => (host, path),
            Some((host, _)) => (host, "/"),
            None => (self.server_addr.as_str(), "/"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ManualNasConfig {
    #[serde(rename = "UserId", default)]
    user_id: Option<i64>,
    #[serde(rename = "GroupId", default)]
    group_id: Option<i64>,
    #[serde(rename = "MountPoints", default)]
    mount_points: Vec<MountPoint>,
}

/// NAS configuration of a service: either `Auto` or explicit mount points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NasConfig {
    Auto,
    Manual {
        user_id: Option<i64>,
        group_id: Option<i64>,
        mount_points: Vec<MountPoint>,
    },
}

impl NasConfig {
    /// Parses the `NasConfig` property value.
    pub fn from_value(value: &serde_yaml::Value) -> Result<Self, serde_yaml::Error> {
        if value.as_str() == Some("Auto") {
            return Ok(Self::Auto);
        }
        let manual: ManualNasConfig = serde_yaml::from_value(value.clone())?;
        Ok(Self::Manual {
            user_id: manual.user_id,
            group_id: manual.group_id,
            mount_points: manual.mount_points,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServiceResource {
    pub nas_config: Option<NasConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionResource {
    pub runtime: Runtime,
    /// Source location as written in the template, relative to the base dir
    pub code_uri: String,
    pub handler: Option<String>,
}

impl FunctionResource {
    /// Whether `CodeUri` names a pre-built archive rather than a directory.
    pub fn code_uri_is_archive(&self) -> bool {
        let lower = self.code_uri.to_ascii_lowercase();
        [".zip", ".jar", ".war"]
            .iter()
            .any(|ext| lower.ends_with(ext))
    }
}

/// One function selected for a build run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionBuildTarget {
    pub service_name: String,
    pub function_name: String,
    pub service: ServiceResource,
    pub function: FunctionResource,
}

impl FunctionBuildTarget {
    /// `service/function`, used in console output and error messages.
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.service_name, self.function_name)
    }

    pub fn runtime(&self) -> &Runtime {
        &self.function.runtime
    }

    /// Absolute source directory, resolved against the base directory.
    pub fn source_dir(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.function.code_uri)
    }

    pub fn nas_config(&self) -> Option<&NasConfig> {
        self.service.nas_config.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_family_from_prefix() {
        assert_eq!(Runtime::new("nodejs12").family(), RuntimeFamily::Nodejs);
        assert_eq!(Runtime::new("python3").family(), RuntimeFamily::Python);
        assert_eq!(Runtime::new("java8").family(), RuntimeFamily::Java);
        assert_eq!(Runtime::new("php7.2").family(), RuntimeFamily::Php);
        assert_eq!(Runtime::new("custom").family(), RuntimeFamily::Custom);
        assert_eq!(Runtime::new("go1").family(), RuntimeFamily::Other);
    }

    #[test]
    fn only_java_is_compiled_archive() {
        assert!(Runtime::new("java8").is_compiled_archive());
        assert!(Runtime::new("java11").is_compiled_archive());
        assert!(!Runtime::new("python3").is_compiled_archive());
    }

    #[test]
    fn mount_point_splits_server_addr() {
        let mp = MountPoint {
            server_addr: "abc.nas.aliyuncs.com:/share".to_owned(),
            mount_dir: "/mnt/data".to_owned(),
        };
        assert_eq!(mp.host_and_path(), ("abc.nas.aliyuncs.com", "/share"));

        let bare = MountPoint {
            server_addr: "abc.nas.aliyuncs.com".to_owned(),
            mount_dir: "/mnt/data".to_owned(),
        };
        assert_eq!(bare.host_and_path(), ("abc.nas.aliyuncs.com", "/"));
    }

    #[test]
    fn nas_config_parses_auto_and_manual() {
        let auto = serde_yaml::Value::String("Auto".to_owned());
        assert_eq!(NasConfig::from_value(&auto).unwrap(), NasConfig::Auto);

        let manual: serde_yaml::Value = serde_yaml::from_str(
            r#"
UserId: 10003
GroupId: 10003
MountPoints:
  - ServerAddr: 'x.nas.aliyuncs.com:/'
    MountDir: /mnt/data
"#,
        )
        .unwrap();
        match NasConfig::from_value(&manual).unwrap() {
            NasConfig::Manual {
                user_id,
                mount_points,
                ..
            } => {
                assert_eq!(user_id, Some(10003));
                assert_eq!(mount_points.len(), 1);
                assert_eq!(mount_points[0].mount_dir, "/mnt/data");
            }
            NasConfig::Auto => panic!("expected manual config"),
        }
    }

    #[test]
    fn archive_code_uri_detection() {
        let f = FunctionResource {
            runtime: Runtime::new("java8"),
            code_uri: "./target/app.JAR".to_owned(),
            handler: None,
        };
        assert!(f.code_uri_is_archive());
    }
}
