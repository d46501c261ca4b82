use funcraft_build::{BuildOrchestrator, BuildReport, RuntimeInstaller};
use funcraft_core::{BuildRun, FuncraftConfig, Stage};
use funcraft_docker::DockerClient;
use std::path::{Path, PathBuf};

use super::RunOptions;

pub async fn build(options: RunOptions) -> anyhow::Result<()> {
    let report = run(options, vec![Stage::Build, Stage::Install]).await?;

    println!();
    println!("Build Success");
    if let Some(template) = &report.template_output {
        println!();
        println!("Built artifacts: {}", report.root_artifacts_dir.display());
        println!("Built template: {}", template.display());
    }
    Ok(())
}

pub async fn install(options: RunOptions) -> anyhow::Result<()> {
    run(options, vec![Stage::Install]).await?;

    println!();
    println!("Install Success");
    Ok(())
}

async fn run(options: RunOptions, stages: Vec<Stage>) -> anyhow::Result<BuildReport> {
    let template_path = options.template;
    if !template_path.is_file() {
        anyhow::bail!(
            "template not found: {}\n\
             Run funcraft in a directory containing template.yml, or pass --template <path>.",
            template_path.display()
        );
    }
    let base_dir = base_dir_of(&template_path);

    let config = FuncraftConfig::load(&base_dir)?;
    tracing::debug!(base_dir = %base_dir.display(), ?stages, "starting run");
    let mut build_run = BuildRun::new(base_dir, template_path, stages)?
        .with_build_name(options.build_name)
        .with_docker(options.use_docker)
        .with_verbose(options.verbose);

    let docker = DockerClient::new();
    let installer = RuntimeInstaller::new(&docker, &config.build);
    let report = BuildOrchestrator::new(&docker, &installer, &config.build)
        .run(&mut build_run)
        .await?;

    print_report(&report);
    Ok(report)
}

/// Directory holding the template; function CodeUris resolve against it.
fn base_dir_of(template_path: &Path) -> PathBuf {
    match template_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn print_report(report: &BuildReport) {
    for (target, dir) in &report.built {
        println!("  built    {} -> {}", target.qualified_name(), dir.display());
    }
    for target in &report.skipped {
        println!("  skipped  {} (nothing to build)", target.qualified_name());
    }

    if !report.advisories.is_empty() {
        eprintln!();
        for advisory in &report.advisories {
            eprintln!("Warning: {advisory}");
        }
    }

    if !report.nas_failures.is_empty() {
        eprintln!();
        eprintln!("Warning: some NAS directories could not be copied out of the build image:");
        for (function, remote) in &report.nas_failures {
            eprintln!("  - {function}: {remote}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_dir_is_template_parent() {
        assert_eq!(base_dir_of(Path::new("template.yml")), PathBuf::from("."));
        assert_eq!(
            base_dir_of(Path::new("proj/template.yml")),
            PathBuf::from("proj")
        );
    }
}
