use std::path::{Path, PathBuf};

/// Lifecycle stage requested for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Build,
    Install,
}

/// One CLI invocation of the build engine.
///
/// Immutable after construction apart from `root_artifacts_dir`, which is
/// derived once the artifact directory manager has prepared it.
#[derive(Debug, Clone)]
pub struct BuildRun {
    pub base_dir: PathBuf,
    pub build_name: Option<String>,
    pub use_docker: bool,
    pub stages: Vec<Stage>,
    pub verbose: bool,
    pub template_path: PathBuf,
    root_artifacts_dir: Option<PathBuf>,
}

impl BuildRun {
    pub fn new(
        base_dir: impl Into<PathBuf>,
        template_path: impl Into<PathBuf>,
        stages: Vec<Stage>,
    ) -> crate::Result<Self> {
        if stages.is_empty() {
            return Err(crate::Error::NoStages);
        }
        Ok(Self {
            base_dir: base_dir.into(),
            build_name: None,
            use_docker: false,
            stages,
            verbose: false,
            template_path: template_path.into(),
            root_artifacts_dir: None,
        })
    }

    pub fn with_build_name(mut self, build_name: Option<String>) -> Self {
        self.build_name = build_name;
        self
    }

    pub fn with_docker(mut self, use_docker: bool) -> Self {
        self.use_docker = use_docker;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn has_build_stage(&self) -> bool {
        self.stages.contains(&Stage::Build)
    }

    /// `install` requested without `build`: artifacts land in place.
    pub fn is_install_only(&self) -> bool {
        !self.has_build_stage() && self.stages.contains(&Stage::Install)
    }

    pub fn root_artifacts_dir(&self) -> Option<&Path> {
        self.root_artifacts_dir.as_deref()
    }

    pub fn set_root_artifacts_dir(&mut self, dir: PathBuf) {
        self.root_artifacts_dir = Some(dir);
    }
}
