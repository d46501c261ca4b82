//! Build orchestration for funcraft.
//!
//! # Build pipeline
//!
//! ```text
//! funcraft build [svc/fn]
//!   1. Targets     ── Template::find_build_targets()
//!   2. Root dir    ── .fun/build/artifacts/ (cleaned; build stage only)
//!   3. Per function, in template order:
//!        a. source check + archive advisory
//!        b. fun.yml → Funfile               (conversion::resolve_build_script)
//!        c. task flow detection             (taskflow::detect_task_flows)
//!        d. skip / container / host         (strategy::select)
//!        e. Funfile → Dockerfile → image → copy /code/. → NAS sync
//!        f. dependency install              (DependencyInstaller)
//!   4. template.yml ── CodeUri → artifact dirs (build stage only)
//!   5. meta.json    ── manifest mtimes + build options (build stage only)
//! ```
//!
//! Functions are built one at a time. A fatal error in one function aborts
//! the run; NAS copy failures are logged and skipped.

pub mod artifacts;
pub mod conversion;
pub mod error;
pub mod funfile;
pub mod installer;
pub mod metadata;
pub mod nas;
pub mod orchestrator;
pub mod strategy;
pub mod taskflow;

pub use error::{BuildError, FunctionError};
pub use funcraft_docker::ContainerRuntime;
pub use installer::{DependencyInstaller, InstallRequest, RuntimeInstaller};
pub use orchestrator::{Advisory, BuildOrchestrator, BuildReport, TargetOutcome};
pub use strategy::BuildStrategy;
