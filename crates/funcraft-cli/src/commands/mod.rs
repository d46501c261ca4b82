mod build;

use std::path::PathBuf;

pub use build::{build, install};

/// Options shared by `build` and `install`.
pub struct RunOptions {
    pub build_name: Option<String>,
    pub use_docker: bool,
    pub template: PathBuf,
    pub verbose: bool,
}
