//! Per-function choice between skipping, a container build, and a host build.

use funcraft_core::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStrategy {
    /// Nothing to install: no legacy config and no manifest
    Skip,
    /// Build inside the runtime image (or the Funfile image)
    Container,
    /// Install dependencies directly on the host
    Host,
}

/// Facts about one function that decide its [`BuildStrategy`].
#[derive(Debug, Clone, Copy)]
pub struct StrategyInputs<'a> {
    pub stages: &'a [Stage],
    /// A Funfile was found or produced from `fun.yml`
    pub has_build_script: bool,
    pub manifest_exists: bool,
    /// Container builds requested on the command line
    pub use_docker: bool,
}

impl StrategyInputs<'_> {
    /// Skip rule: a build run with neither Funfile nor manifest, or an
    /// install-only run without a manifest.
    ///
    /// An explicit container request does not override this.
    pub fn should_skip(&self) -> bool {
        let build = self.stages.contains(&Stage::Build);
        let install_only = !build && self.stages.contains(&Stage::Install);

        (build && !self.has_build_script && !self.manifest_exists)
            || (install_only && !self.manifest_exists)
    }

    pub fn select(&self) -> BuildStrategy {
        if self.should_skip() {
            BuildStrategy::Skip
        } else if self.has_build_script || self.use_docker {
            BuildStrategy::Container
        } else {
            BuildStrategy::Host
        }
    }
}
