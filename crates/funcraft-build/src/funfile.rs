//! `fun.yml` and `Funfile` text generation.
//!
//! `fun.yml` is the legacy per-function build descriptor:
//!
//! ```yaml
//! runtime: python3
//! tasks:
//!   - apt-get: libzbar0
//!   - pip: Pillow flask
//!     local: false
//!   - shell: |-
//!       ./configure
//!       make
//! ```
//!
//! A `Funfile` is a Dockerfile-like script whose first instruction is
//! `RUNTIME <id>`. It is turned into a real Dockerfile by
//! [`DockerfileGenerator`] using the runtime build image.

use funcraft_core::{BuildSettings, Runtime};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::conversion::GENERATED_DOCKERFILE;

#[derive(Debug, Deserialize)]
struct LegacyConfig {
    runtime: String,
    #[serde(default)]
    tasks: Vec<LegacyTask>,
}

#[derive(Debug, Deserialize)]
struct LegacyTask {
    #[serde(rename = "apt-get")]
    apt_get: Option<String>,
    pip: Option<String>,
    npm: Option<String>,
    shell: Option<String>,
    /// Install into the code directory via `fun-install` (default) or system-wide
    #[serde(default = "default_local")]
    local: bool,
}

fn default_local() -> bool {
    true
}

/// Converts a `fun.yml` file into `Funfile` text.
pub fn legacy_to_funfile(legacy_path: &Path) -> Result<String, ConversionError> {
    let content = std::fs::read_to_string(legacy_path).map_err(|e| ConversionError::Read {
        path: legacy_path.to_path_buf(),
        source: e,
    })?;
    let config: LegacyConfig =
        serde_yaml::from_str(&content).map_err(|e| ConversionError::ParseLegacy {
            path: legacy_path.to_path_buf(),
            source: e,
        })?;

    let mut lines = vec![format!("RUNTIME {}", config.runtime)];
    for (index, task) in config.tasks.iter().enumerate() {
        lines.push(render_task(task).ok_or_else(|| ConversionError::InvalidTask {
            path: legacy_path.to_path_buf(),
            index,
        })?);
    }

    let mut funfile = lines.join("\n");
    funfile.push('\n');
    Ok(funfile)
}

fn render_task(task: &LegacyTask) -> Option<String> {
    let installers = [
        ("apt-get", task.apt_get.as_deref()),
        ("pip", task.pip.as_deref()),
        ("npm", task.npm.as_deref()),
    ];
    let declared = installers.iter().filter(|(_, v)| v.is_some()).count()
        + usize::from(task.shell.is_some());
    if declared != 1 {
        return None;
    }

    if let Some(script) = task.shell.as_deref() {
        let commands: Vec<&str> = script
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        if commands.is_empty() {
            return None;
        }
        return Some(format!("RUN {}", commands.join(" && \\\n    ")));
    }

    let (tool, packages) = installers
        .iter()
        .find_map(|(tool, v)| v.map(|p| (*tool, p.trim())))?;

    let line = match (task.local, tool) {
        (true, _) => format!("RUN fun-install {tool} install {packages}"),
        (false, "apt-get") => {
            format!("RUN apt-get update && apt-get install -y {packages}")
        }
        (false, _) => format!("RUN {tool} install {packages}"),
    };
    Some(line)
}

/// A parsed `Funfile`: its runtime plus the remaining instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Funfile {
    pub runtime: String,
    pub instructions: Vec<String>,
}

impl Funfile {
    pub fn load(path: &Path) -> Result<Self, ConversionError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConversionError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content).ok_or_else(|| ConversionError::MissingRuntime(path.to_path_buf()))
    }

    /// Returns `None` when the first instruction is not `RUNTIME <id>`.
    pub fn parse(content: &str) -> Option<Self> {
        let mut instructions = content
            .lines()
            .filter(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'));

        let first = instructions.next()?;
        let runtime = first
            .trim()
            .strip_prefix("RUNTIME")
            .map(str::trim)
            .filter(|r| !r.is_empty())?
            .to_owned();

        Some(Self {
            runtime,
            instructions: instructions.map(str::to_owned).collect(),
        })
    }

    fn copies_code(&self) -> bool {
        self.instructions
            .iter()
            .any(|i| i.trim_start().starts_with("COPY") && i.contains("/code"))
    }
}

/// Renders the container build script for one function.
pub struct DockerfileGenerator<'a> {
    settings: &'a BuildSettings,
    runtime: &'a Runtime,
    service_name: &'a str,
    function_name: &'a str,
}

impl<'a> DockerfileGenerator<'a> {
    pub fn new(
        settings: &'a BuildSettings,
        runtime: &'a Runtime,
        service_name: &'a str,
        function_name: &'a str,
    ) -> Self {
        Self {
            settings,
            runtime,
            service_name,
            function_name,
        }
    }

    pub fn render(&self, funfile: &Funfile) -> String {
        if funfile.runtime != self.runtime.as_str() {
            tracing::warn!(
                funfile_runtime = %funfile.runtime,
                template_runtime = %self.runtime,
                "Funfile RUNTIME differs from the template; using the template runtime"
            );
        }

        let copy_code = if funfile.copies_code() {
            String::new()
        } else {
            format!("COPY . /code\nRUN rm -f /code/{GENERATED_DOCKERFILE}\n")
        };

        let body = funfile.instructions.join("\n");

        format!(
            r#"FROM {image}
LABEL funcraft.service="{service}" funcraft.function="{function}"
WORKDIR /code
{copy_code}{body}
"#,
            image = self.settings.build_image(self.runtime.as_str()),
            service = self.service_name,
            function = self.function_name,
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}")]
    ParseLegacy {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("task #{index} in {path} must declare exactly one of apt-get, pip, npm, shell")]
    InvalidTask { path: PathBuf, index: usize },
    #[error("{0} does not start with a RUNTIME instruction")]
    MissingRuntime(PathBuf),
    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}
