//! Detects which dependency-install task flows apply to a source tree.

use funcraft_core::{Runtime, RuntimeFamily};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskFlowKind {
    /// Always present; installs nothing
    Default,
    Npm,
    Pip,
    Maven,
    Composer,
}

impl TaskFlowKind {
    pub fn manifest_file(self) -> Option<&'static str> {
        match self {
            Self::Default => None,
            Self::Npm => Some("package.json"),
            Self::Pip => Some("requirements.txt"),
            Self::Maven => Some("pom.xml"),
            Self::Composer => Some("composer.json"),
        }
    }

    /// Shell command run in the artifact directory to install dependencies.
    pub fn install_script(self) -> Option<&'static str> {
        match self {
            Self::Default => None,
            Self::Npm => Some("npm install --production"),
            Self::Pip => Some("pip install -r requirements.txt -t ."),
            Self::Maven => Some("mvn package -DskipTests"),
            Self::Composer => Some("composer install --no-dev"),
        }
    }

    fn for_runtime(runtime: &Runtime) -> &'static [TaskFlowKind] {
        match runtime.family() {
            RuntimeFamily::Nodejs => &[Self::Npm],
            RuntimeFamily::Python => &[Self::Pip],
            RuntimeFamily::Java => &[Self::Maven],
            RuntimeFamily::Php => &[Self::Composer],
            RuntimeFamily::Custom => &[Self::Npm, Self::Pip, Self::Maven, Self::Composer],
            RuntimeFamily::Dotnetcore | RuntimeFamily::Other => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFlow {
    pub kind: TaskFlowKind,
    /// Manifest that triggered this flow; `None` for the default flow
    pub manifest: Option<PathBuf>,
}

impl TaskFlow {
    pub fn manifest_path(&self) -> Option<&Path> {
        self.manifest.as_deref()
    }
}

/// Task flows for `source_dir`, starting with the default flow.
pub fn detect_task_flows(runtime: &Runtime, source_dir: &Path) -> Vec<TaskFlow> {
    let mut flows = vec![TaskFlow {
        kind: TaskFlowKind::Default,
        manifest: None,
    }];

    for kind in TaskFlowKind::for_runtime(runtime) {
        let Some(file) = kind.manifest_file() else {
            continue;
        };
        let manifest = source_dir.join(file);
        if manifest.is_file() {
            flows.push(TaskFlow {
                kind: *kind,
                manifest: Some(manifest),
            });
        }
    }

    tracing::debug!(
        runtime = %runtime,
        dir = %source_dir.display(),
        flows = flows.len(),
        "detected task flows"
    );
    flows
}

/// True when at least one flow beyond the default one was detected.
pub fn manifest_exists(flows: &[TaskFlow]) -> bool {
    flows.iter().any(|f| f.kind != TaskFlowKind::Default)
}

/// Install scripts of the detected flows, in detection order.
pub fn install_scripts(flows: &[TaskFlow]) -> Vec<&'static str> {
    flows.iter().filter_map(|f| f.kind.install_script()).collect()
}
