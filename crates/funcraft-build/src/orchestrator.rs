//! Top-level driver of a build or install run.

use funcraft_core::{BuildRun, BuildSettings, FunctionBuildTarget, Template};
use funcraft_docker::ContainerRuntime;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

use crate::artifacts::ArtifactDirectoryManager;
use crate::conversion::{self, BUILD_SCRIPT, LEGACY_CONFIG};
use crate::error::{BuildError, FunctionError};
use crate::installer::{DependencyInstaller, InstallRequest};
use crate::metadata::{self, BuildOpts, META_FILE};
use crate::nas::{self, NasSynchronizer};
use crate::strategy::{BuildStrategy, StrategyInputs};
use crate::taskflow;

/// File name of the rewritten template inside the root artifact directory.
pub const TEMPLATE_FILE: &str = "template.yml";

/// Path inside a Funfile image holding the built function code.
const IMAGE_CODE_DIR: &str = "/code/.";

/// Result of processing one function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    Skipped,
    Built { artifact_dir: PathBuf },
}

/// Non-fatal conditions reported to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    /// A Funfile/fun.yml at the base directory that no function's CodeUri points at
    UnreferencedBuildFile(PathBuf),
    /// A compiled-archive runtime whose CodeUri is already an archive
    ArchiveCodeUri { function: String, code_uri: String },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnreferencedBuildFile(path) => write!(
                f,
                "{} is not referenced by any function's CodeUri and will be ignored",
                path.display()
            ),
            Self::ArchiveCodeUri { function, code_uri } => write!(
                f,
                "{function}: CodeUri {code_uri} is a pre-built archive; no compile step will run"
            ),
        }
    }
}

/// Everything a run produced, in template declaration order.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub root_artifacts_dir: PathBuf,
    pub built: Vec<(FunctionBuildTarget, PathBuf)>,
    pub skipped: Vec<FunctionBuildTarget>,
    pub advisories: Vec<Advisory>,
    /// `(service/function, remote dir)` NAS copies that failed and were skipped
    pub nas_failures: Vec<(String, String)>,
    pub template_output: Option<PathBuf>,
    pub metadata_output: Option<PathBuf>,
}

impl BuildReport {
    fn record(&mut self, target: &FunctionBuildTarget, outcome: TargetOutcome) {
        match outcome {
            TargetOutcome::Skipped => self.skipped.push(target.clone()),
            TargetOutcome::Built { artifact_dir } => {
                self.built.push((target.clone(), artifact_dir))
            }
        }
    }

    fn advise(&mut self, advisory: Advisory) {
        tracing::warn!("{advisory}");
        self.advisories.push(advisory);
    }
}

/// Drives a [`BuildRun`] through every selected function, one at a time.
pub struct BuildOrchestrator<'a, C: ContainerRuntime, I: DependencyInstaller> {
    runtime: &'a C,
    installer: &'a I,
    settings: &'a BuildSettings,
}

impl<'a, C: ContainerRuntime, I: DependencyInstaller> BuildOrchestrator<'a, C, I> {
    pub fn new(runtime: &'a C, installer: &'a I, settings: &'a BuildSettings) -> Self {
        Self {
            runtime,
            installer,
            settings,
        }
    }

    /// Runs every stage of `run`. The first fatal function error aborts the run.
    pub async fn run(&self, run: &mut BuildRun) -> Result<BuildReport, BuildError> {
        let mut template = Template::load(&run.template_path)?;
        let targets = template.find_build_targets(run.build_name.as_deref())?;
        tracing::info!(functions = targets.len(), "resolved build targets");

        let mut report = BuildReport::default();
        let code_uris = template.code_uris()?;
        if let Some(advisory) = unreferenced_build_file(&run.base_dir, &code_uris) {
            report.advise(advisory);
        }

        let root = ArtifactDirectoryManager::new(self.settings)
            .resolve_root_artifacts_dir(&run.base_dir, &run.stages)
            .map_err(BuildError::RootArtifacts)?;
        run.set_root_artifacts_dir(root.clone());
        report.root_artifacts_dir = root.clone();

        for target in &targets {
            let outcome = self
                .build_target(run, &root, target, &mut report)
                .await
                .map_err(|source| BuildError::Function {
                    service: target.service_name.clone(),
                    function: target.function_name.clone(),
                    source,
                })?;
            report.record(target, outcome);
        }

        if run.has_build_stage() {
            let summary =
                template.rewrite_for_artifacts(&report.built, &report.skipped, &run.base_dir)?;
            let template_output = root.join(TEMPLATE_FILE);
            template.save(&template_output)?;
            tracing::info!(
                rewritten = summary.rewritten.len(),
                unbuilt = summary.unbuilt.len(),
                path = %template_output.display(),
                "wrote build template"
            );
            report.template_output = Some(template_output);

            let paths =
                metadata::collect_manifest_paths(&targets, &run.base_dir, &run.template_path);
            let meta_path = root.join(META_FILE);
            metadata::record_timestamps(&paths, BuildOpts::from(&*run), &meta_path)?;
            report.metadata_output = Some(meta_path);
        }

        Ok(report)
    }

    async fn build_target(
        &self,
        run: &BuildRun,
        root: &Path,
        target: &FunctionBuildTarget,
        report: &mut BuildReport,
    ) -> Result<TargetOutcome, FunctionError> {
        let name = target.qualified_name();
        let source_dir = target.source_dir(&run.base_dir);
        if !source_dir.exists() {
            return Err(FunctionError::MissingSource(source_dir));
        }

        if target.runtime().is_compiled_archive() && target.function.code_uri_is_archive() {
            report.advise(Advisory::ArchiveCodeUri {
                function: name.clone(),
                code_uri: target.function.code_uri.clone(),
            });
        }

        let build_script = conversion::resolve_build_script(&source_dir)?;
        let flows = taskflow::detect_task_flows(target.runtime(), &source_dir);
        let strategy = StrategyInputs {
            stages: &run.stages,
            has_build_script: build_script.is_some(),
            manifest_exists: taskflow::manifest_exists(&flows),
            use_docker: run.use_docker,
        }
        .select();

        // Nothing to do and nothing written
        if build_script.is_none() && strategy == BuildStrategy::Skip {
            tracing::info!(function = %name, "no Funfile or dependency manifest; skipping");
            return Ok(TargetOutcome::Skipped);
        }

        let artifact_dir = ArtifactDirectoryManager::new(self.settings)
            .resolve_function_artifacts_dir(root, &run.base_dir, target, &run.stages)?;

        let image = match &build_script {
            Some(funfile) => Some(
                self.build_funfile_image(run, root, target, funfile, &artifact_dir, report)
                    .await?,
            ),
            None => None,
        };

        let request = InstallRequest::new(
            target,
            &run.base_dir,
            &artifact_dir,
            run.verbose,
            &run.stages,
        )
        .with_image(image);

        match strategy {
            BuildStrategy::Skip => {
                tracing::info!(function = %name, "no dependency manifest; skipping install");
                return Ok(TargetOutcome::Skipped);
            }
            BuildStrategy::Container => {
                tracing::info!(function = %name, "building in container");
                self.installer.install_in_container(&request).await?;
            }
            BuildStrategy::Host => {
                tracing::info!(function = %name, "building on host");
                self.installer.install_in_process(&request).await?;
            }
        }

        Ok(TargetOutcome::Built { artifact_dir })
    }

    /// Builds the Funfile image, copies its code and NAS output out, and
    /// removes the generated Dockerfile on every exit path.
    async fn build_funfile_image(
        &self,
        run: &BuildRun,
        root: &Path,
        target: &FunctionBuildTarget,
        funfile: &Path,
        artifact_dir: &Path,
        report: &mut BuildReport,
    ) -> Result<String, FunctionError> {
        let name = target.qualified_name();
        tracing::info!(function = %name, "Funfile found; building image");

        let generated = conversion::materialize_container_build_script(
            funfile,
            target.runtime(),
            &target.service_name,
            &target.function_name,
            self.settings,
        )?;

        let context = target.source_dir(&run.base_dir);
        let tag = format!("{}-{}", self.settings.tag_prefix, Uuid::new_v4());
        let image = self
            .runtime
            .build_image(&context, generated.path(), &tag)
            .await
            .map_err(|e| FunctionError::ContainerBuild { source: e })?;

        tracing::info!(
            function = %name,
            dir = %artifact_dir.display(),
            "copying function artifact"
        );
        self.runtime
            .copy_from_image(&image, IMAGE_CODE_DIR, artifact_dir)
            .await
            .map_err(|e| FunctionError::ArtifactCopy {
                image: image.clone(),
                source: e,
            })?;

        let mappings = target
            .nas_config()
            .map(|config| {
                nas::resolve_mappings(
                    &run.base_dir,
                    &self.settings.default_nas_dir,
                    config,
                    &target.service_name,
                )
            })
            .unwrap_or_default();
        let sync = NasSynchronizer::new(self.runtime, &self.settings.nas_dir)
            .synchronize(&mappings, &image, root, artifact_dir)
            .await?;
        report
            .nas_failures
            .extend(sync.failed.into_iter().map(|remote| (name.clone(), remote)));

        let path = generated.path().to_path_buf();
        generated
            .remove()
            .map_err(|e| FunctionError::Cleanup { path, source: e })?;

        Ok(image)
    }
}

/// A top-level Funfile or fun.yml that no function in the template builds from.
fn unreferenced_build_file(base_dir: &Path, code_uris: &[&str]) -> Option<Advisory> {
    let base = normalize(base_dir);
    let referenced = code_uris
        .iter()
        .any(|code_uri| normalize(&base_dir.join(code_uri)) == base);
    if referenced {
        return None;
    }

    [BUILD_SCRIPT, LEGACY_CONFIG]
        .iter()
        .map(|name| base_dir.join(name))
        .find(|path| path.is_file())
        .map(Advisory::UnreferencedBuildFile)
}

/// Lexically resolves `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
