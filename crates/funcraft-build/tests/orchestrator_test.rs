use funcraft_build::conversion::GENERATED_DOCKERFILE;
use funcraft_build::installer::InstallError;
use funcraft_build::{
    Advisory, BuildError, BuildOrchestrator, DependencyInstaller, FunctionError, InstallRequest,
};
use funcraft_core::{BuildRun, BuildSettings, Stage, Template};
use funcraft_docker::{ContainerError, ContainerRuntime, DockerError, Mount};
use mockall::mock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

mock! {
    Runtime {}

    impl ContainerRuntime for Runtime {
        async fn build_image(
            &self,
            context_dir: &Path,
            dockerfile: &Path,
            tag: &str,
        ) -> Result<String, ContainerError>;

        async fn copy_from_image(
            &self,
            image: &str,
            src: &str,
            dest: &Path,
        ) -> Result<(), ContainerError>;

        async fn run_container(
            &self,
            image: &str,
            mounts: &[Mount],
            workdir: &str,
            script: &str,
        ) -> Result<(), ContainerError>;
    }
}

mock! {
    Installer {}

    impl DependencyInstaller for Installer {
        async fn install_in_process(&self, request: &InstallRequest) -> Result<(), InstallError>;

        async fn install_in_container(&self, request: &InstallRequest) -> Result<(), InstallError>;
    }
}

fn function(name: &str, runtime: &str, code_uri: &str) -> String {
    format!(
        r#"
    {name}:
      Type: 'Aliyun::Serverless::Function'
      Properties:
        Handler: index.handler
        Runtime: {runtime}
        CodeUri: {code_uri}"#
    )
}

fn template(service_properties: &str, functions: &[String]) -> String {
    format!(
        r#"ROSTemplateFormatVersion: '2015-09-01'
Resources:
  svcA:
    Type: 'Aliyun::Serverless::Service'
    Properties:
{service_properties}{functions}
"#,
        functions = functions.concat()
    )
}

fn project(template_text: &str, files: &[(&str, &str)]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("template.yml"), template_text).unwrap();
    for (path, content) in files {
        let path = tmp.path().join(path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
    tmp
}

fn build_run(tmp: &TempDir, stages: Vec<Stage>) -> BuildRun {
    BuildRun::new(tmp.path(), tmp.path().join("template.yml"), stages).unwrap()
}

fn copy_failure(image: &str, src: &str) -> ContainerError {
    ContainerError::Copy {
        image: image.to_owned(),
        src: src.to_owned(),
        source: DockerError::CommandFailed {
            args: vec!["cp".to_owned()],
            stderr: "Could not find the file".to_owned(),
        },
    }
}

const NO_PROPS: &str = "      Description: test\n";

// ── Skip ──

#[tokio::test]
async fn function_without_build_config_is_skipped_without_writes() {
    let text = template(NO_PROPS, &[function("fnA", "python3", "./fnA")]);
    let tmp = project(&text, &[("fnA/index.py", "def handler(e, c): pass")]);
    let settings = BuildSettings::default();
    let runtime = MockRuntime::new();
    let installer = MockInstaller::new();
    let mut run = build_run(&tmp, vec![Stage::Build]);

    let report = BuildOrchestrator::new(&runtime, &installer, &settings)
        .run(&mut run)
        .await
        .unwrap();

    assert!(report.built.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert!(!tmp.path().join(".fun/build/artifacts/svcA").exists());

    let written = Template::load(&tmp.path().join(".fun/build/artifacts/template.yml")).unwrap();
    assert_eq!(written.code_uri("svcA", "fnA"), Some("./fnA"));
}

#[tokio::test]
async fn docker_request_does_not_override_skip() {
    let text = template(NO_PROPS, &[function("fnA", "nodejs12", "./fnA")]);
    let tmp = project(&text, &[("fnA/index.js", "")]);
    let settings = BuildSettings::default();
    let runtime = MockRuntime::new();
    let installer = MockInstaller::new();
    let mut run = build_run(&tmp, vec![Stage::Build]).with_docker(true);

    let report = BuildOrchestrator::new(&runtime, &installer, &settings)
        .run(&mut run)
        .await
        .unwrap();

    assert_eq!(report.skipped.len(), 1);
}

// ── Host and container installs ──

#[tokio::test]
async fn manifest_builds_on_host_and_rewrites_template() {
    let text = template(NO_PROPS, &[function("fnA", "python3", "./fnA")]);
    let tmp = project(
        &text,
        &[("fnA/index.py", ""), ("fnA/requirements.txt", "flask")],
    );
    let settings = BuildSettings::default();
    let runtime = MockRuntime::new();
    let mut installer = MockInstaller::new();
    let expected_dir = tmp.path().join(".fun/build/artifacts/svcA/fnA");
    let expected = expected_dir.clone();
    installer
        .expect_install_in_process()
        .withf(move |req| req.artifact_dir == expected && req.image.is_none())
        .times(1)
        .returning(|req| {
            std::fs::write(req.artifact_dir.join("index.py"), "").unwrap();
            Ok(())
        });
    let mut run = build_run(&tmp, vec![Stage::Build]);

    let report = BuildOrchestrator::new(&runtime, &installer, &settings)
        .run(&mut run)
        .await
        .unwrap();

    assert_eq!(report.built.len(), 1);
    assert_eq!(report.built[0].1, expected_dir);
    assert_eq!(
        run.root_artifacts_dir(),
        Some(tmp.path().join(".fun/build/artifacts").as_path())
    );

    let written = Template::load(report.template_output.as_ref().unwrap()).unwrap();
    assert_eq!(
        written.code_uri("svcA", "fnA"),
        Some(".fun/build/artifacts/svcA/fnA")
    );

    let meta = std::fs::read_to_string(report.metadata_output.as_ref().unwrap()).unwrap();
    assert!(meta.contains("requirements.txt"));
    assert!(meta.contains("template.yml"));
}

#[tokio::test]
async fn use_docker_selects_container_install() {
    let text = template(NO_PROPS, &[function("fnA", "nodejs12", "./fnA")]);
    let tmp = project(&text, &[("fnA/package.json", "{}")]);
    let settings = BuildSettings::default();
    let runtime = MockRuntime::new();
    let mut installer = MockInstaller::new();
    installer
        .expect_install_in_container()
        .withf(|req| req.image.is_none() && req.function_name == "fnA")
        .times(1)
        .returning(|_| Ok(()));
    let mut run = build_run(&tmp, vec![Stage::Build]).with_docker(true);

    let report = BuildOrchestrator::new(&runtime, &installer, &settings)
        .run(&mut run)
        .await
        .unwrap();

    assert_eq!(report.built.len(), 1);
}

#[tokio::test]
async fn install_failure_aborts_run() {
    let text = template(
        NO_PROPS,
        &[
            function("fnA", "python3", "./fnA"),
            function("fnB", "python3", "./fnB"),
        ],
    );
    let tmp = project(
        &text,
        &[("fnA/requirements.txt", "x"), ("fnB/requirements.txt", "y")],
    );
    let settings = BuildSettings::default();
    let runtime = MockRuntime::new();
    let mut installer = MockInstaller::new();
    installer
        .expect_install_in_process()
        .withf(|req| req.function_name == "fnA")
        .times(1)
        .returning(|_| {
            Err(InstallError::ScriptFailed {
                script: "pip install -r requirements.txt -t .".to_owned(),
                detail: "no network".to_owned(),
            })
        });
    let mut run = build_run(&tmp, vec![Stage::Build]);

    let err = BuildOrchestrator::new(&runtime, &installer, &settings)
        .run(&mut run)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BuildError::Function {
            ref function,
            source: FunctionError::Install(_),
            ..
        } if function == "fnA"
    ));
    assert!(!tmp.path().join(".fun/build/artifacts/template.yml").exists());
}

// ── Funfile pipeline ──

#[tokio::test]
async fn legacy_config_builds_image_and_copies_code() {
    let text = template(NO_PROPS, &[function("fnA", "python3", "./fnA")]);
    let tmp = project(
        &text,
        &[
            ("fnA/index.py", ""),
            ("fnA/fun.yml", "runtime: python3\ntasks:\n  - pip: flask\n"),
        ],
    );
    let settings = BuildSettings::default();
    let source_dir = tmp.path().join("./fnA");
    let artifact_dir = tmp.path().join(".fun/build/artifacts/svcA/fnA");

    let mut runtime = MockRuntime::new();
    let context = source_dir.clone();
    runtime
        .expect_build_image()
        .withf(move |ctx, dockerfile, tag| {
            ctx == context
                && dockerfile.ends_with(GENERATED_DOCKERFILE)
                && tag.starts_with("funcraft-cache-")
        })
        .times(1)
        .returning(|_, dockerfile, tag| {
            assert!(dockerfile.is_file());
            Ok(tag.to_owned())
        });
    let dest = artifact_dir.clone();
    runtime
        .expect_copy_from_image()
        .withf(move |_, src, d| src == "/code/." && d == dest)
        .times(1)
        .returning(|_, _, dest| {
            std::fs::write(dest.join("index.py"), "").unwrap();
            Ok(())
        });

    let mut installer = MockInstaller::new();
    installer
        .expect_install_in_container()
        .withf(|req| {
            req.image
                .as_deref()
                .is_some_and(|i| i.starts_with("funcraft-cache-"))
        })
        .times(1)
        .returning(|_| Ok(()));
    let mut run = build_run(&tmp, vec![Stage::Build]);

    let report = BuildOrchestrator::new(&runtime, &installer, &settings)
        .run(&mut run)
        .await
        .unwrap();

    assert_eq!(report.built.len(), 1);
    assert_eq!(report.built[0].1, artifact_dir);
    assert!(source_dir.join("Funfile").is_file());
    assert!(!source_dir.join(GENERATED_DOCKERFILE).exists());
    assert!(artifact_dir.join("index.py").is_file());
}

#[tokio::test]
async fn image_build_failure_removes_script_and_aborts() {
    let text = template(
        NO_PROPS,
        &[
            function("fnA", "python3", "./fnA"),
            function("fnB", "python3", "./fnB"),
        ],
    );
    let tmp = project(
        &text,
        &[
            ("fnA/Funfile", "RUNTIME python3\nRUN exit 1\n"),
            ("fnB/requirements.txt", "flask"),
        ],
    );
    let settings = BuildSettings::default();
    let mut runtime = MockRuntime::new();
    runtime
        .expect_build_image()
        .times(1)
        .returning(|_, _, tag| {
            Err(ContainerError::Build {
                tag: tag.to_owned(),
                source: DockerError::CommandFailed {
                    args: vec!["build".to_owned()],
                    stderr: "exit code 1".to_owned(),
                },
            })
        });
    let installer = MockInstaller::new();
    let mut run = build_run(&tmp, vec![Stage::Build]);

    let err = BuildOrchestrator::new(&runtime, &installer, &settings)
        .run(&mut run)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BuildError::Function { source: FunctionError::ContainerBuild { .. }, .. }
    ));
    assert!(!tmp.path().join("fnA").join(GENERATED_DOCKERFILE).exists());
    assert!(!tmp.path().join(".fun/build/artifacts/svcA/fnB").exists());
}

#[tokio::test]
async fn nas_copy_failure_is_not_fatal() {
    let nas = r#"      NasConfig:
        UserId: 10003
        GroupId: 10003
        MountPoints:
          - ServerAddr: 'abc.nas.aliyuncs.com:/share'
            MountDir: /mnt/data
"#;
    let text = template(
        nas,
        &[
            function("fnA", "python3", "./fnA"),
            function("fnB", "python3", "./fnB"),
        ],
    );
    let funfile = "RUNTIME python3\nRUN fun-install pip install flask\n";
    let tmp = project(&text, &[("fnA/Funfile", funfile), ("fnB/Funfile", funfile)]);
    let settings = BuildSettings::default();

    let mut runtime = MockRuntime::new();
    runtime
        .expect_build_image()
        .times(2)
        .returning(|_, _, tag| Ok(tag.to_owned()));
    runtime
        .expect_copy_from_image()
        .withf(|_, src, _| src == "/code/.")
        .times(2)
        .returning(|_, _, _| Ok(()));
    let nas_calls = Arc::new(AtomicUsize::new(0));
    let calls = Arc::clone(&nas_calls);
    let local_nas = tmp.path().join(".fun/nas/abc.nas.aliyuncs.com/share");
    runtime
        .expect_copy_from_image()
        .withf(move |_, src, dest| src == "/mnt/data/" && dest == local_nas)
        .times(2)
        .returning(move |image, src, _| {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(copy_failure(image, src))
            } else {
                Ok(())
            }
        });

    let mut installer = MockInstaller::new();
    installer
        .expect_install_in_container()
        .times(2)
        .returning(|_| Ok(()));
    let mut run = build_run(&tmp, vec![Stage::Build]);

    let report = BuildOrchestrator::new(&runtime, &installer, &settings)
        .run(&mut run)
        .await
        .unwrap();

    assert_eq!(report.built.len(), 2);
    assert_eq!(
        report.nas_failures,
        vec![("svcA/fnA".to_owned(), "/mnt/data/".to_owned())]
    );
    assert_eq!(nas_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn install_only_without_manifest_skips_after_image_build() {
    let text = template(NO_PROPS, &[function("fnA", "python3", "./fnA")]);
    let tmp = project(&text, &[("fnA/Funfile", "RUNTIME python3\n")]);
    let settings = BuildSettings::default();
    let mut runtime = MockRuntime::new();
    runtime
        .expect_build_image()
        .times(1)
        .returning(|_, _, tag| Ok(tag.to_owned()));
    let source = tmp.path().join("./fnA");
    runtime
        .expect_copy_from_image()
        .withf(move |_, src, dest| src == "/code/." && dest == source)
        .times(1)
        .returning(|_, _, _| Ok(()));
    let installer = MockInstaller::new();
    let mut run = build_run(&tmp, vec![Stage::Install]);

    let report = BuildOrchestrator::new(&runtime, &installer, &settings)
        .run(&mut run)
        .await
        .unwrap();

    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.root_artifacts_dir, tmp.path());
    assert!(report.template_output.is_none());
    assert!(!tmp.path().join(".fun/build").exists());
}

// ── Install-only ──

#[tokio::test]
async fn install_only_installs_in_place() {
    let text = template(NO_PROPS, &[function("fnA", "nodejs12", "./fnA")]);
    let tmp = project(&text, &[("fnA/package.json", "{}"), ("fnA/index.js", "")]);
    let settings = BuildSettings::default();
    let runtime = MockRuntime::new();
    let mut installer = MockInstaller::new();
    let source: PathBuf = tmp.path().join("./fnA");
    installer
        .expect_install_in_process()
        .withf(move |req| req.artifact_dir == source && req.source_dir == source)
        .times(1)
        .returning(|_| Ok(()));
    let mut run = build_run(&tmp, vec![Stage::Install]);

    let report = BuildOrchestrator::new(&runtime, &installer, &settings)
        .run(&mut run)
        .await
        .unwrap();

    assert_eq!(report.built.len(), 1);
    assert!(report.metadata_output.is_none());
    assert!(tmp.path().join("fnA/index.js").is_file());
}

// ── Errors and advisories ──

#[tokio::test]
async fn missing_source_directory_is_fatal() {
    let text = template(NO_PROPS, &[function("fnA", "python3", "./missing")]);
    let tmp = project(&text, &[]);
    let settings = BuildSettings::default();
    let runtime = MockRuntime::new();
    let installer = MockInstaller::new();
    let mut run = build_run(&tmp, vec![Stage::Build]);

    let err = BuildOrchestrator::new(&runtime, &installer, &settings)
        .run(&mut run)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BuildError::Function { source: FunctionError::MissingSource(_), .. }
    ));
}

#[tokio::test]
async fn unknown_build_name_is_an_error() {
    let text = template(NO_PROPS, &[function("fnA", "python3", "./fnA")]);
    let tmp = project(&text, &[("fnA/index.py", "")]);
    let settings = BuildSettings::default();
    let runtime = MockRuntime::new();
    let installer = MockInstaller::new();
    let mut run = build_run(&tmp, vec![Stage::Build]).with_build_name(Some("nope".to_owned()));

    let err = BuildOrchestrator::new(&runtime, &installer, &settings)
        .run(&mut run)
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::Core(_)));
}

#[tokio::test]
async fn build_name_limits_targets() {
    let text = template(
        NO_PROPS,
        &[
            function("fnA", "python3", "./fnA"),
            function("fnB", "python3", "./fnB"),
        ],
    );
    let tmp = project(
        &text,
        &[("fnA/requirements.txt", "x"), ("fnB/requirements.txt", "y")],
    );
    let settings = BuildSettings::default();
    let runtime = MockRuntime::new();
    let mut installer = MockInstaller::new();
    installer
        .expect_install_in_process()
        .withf(|req| req.function_name == "fnB")
        .times(1)
        .returning(|_| Ok(()));
    let mut run =
        build_run(&tmp, vec![Stage::Build]).with_build_name(Some("svcA/fnB".to_owned()));

    let report = BuildOrchestrator::new(&runtime, &installer, &settings)
        .run(&mut run)
        .await
        .unwrap();

    assert_eq!(report.built.len(), 1);
    assert_eq!(report.built[0].0.function_name, "fnB");
}

#[tokio::test]
async fn unreferenced_top_level_funfile_is_reported() {
    let text = template(NO_PROPS, &[function("fnA", "python3", "./fnA")]);
    let tmp = project(&text, &[("Funfile", "RUNTIME python3\n"), ("fnA/index.py", "")]);
    let settings = BuildSettings::default();
    let runtime = MockRuntime::new();
    let installer = MockInstaller::new();
    let mut run = build_run(&tmp, vec![Stage::Build]);

    let report = BuildOrchestrator::new(&runtime, &installer, &settings)
        .run(&mut run)
        .await
        .unwrap();

    assert_eq!(
        report.advisories,
        vec![Advisory::UnreferencedBuildFile(tmp.path().join("Funfile"))]
    );
}

#[tokio::test]
async fn top_level_funfile_of_unselected_function_is_not_reported() {
    let text = template(
        NO_PROPS,
        &[
            function("fnA", "python3", "./"),
            function("fnB", "python3", "./fnB"),
        ],
    );
    let tmp = project(&text, &[("Funfile", "RUNTIME python3\n"), ("fnB/index.py", "")]);
    let settings = BuildSettings::default();
    let runtime = MockRuntime::new();
    let installer = MockInstaller::new();
    let mut run =
        build_run(&tmp, vec![Stage::Build]).with_build_name(Some("svcA/fnB".to_owned()));

    let report = BuildOrchestrator::new(&runtime, &installer, &settings)
        .run(&mut run)
        .await
        .unwrap();

    assert!(report.advisories.is_empty());
    assert_eq!(report.skipped.len(), 1);
}

#[tokio::test]
async fn java_archive_code_uri_is_reported() {
    let text = template(NO_PROPS, &[function("fnA", "java8", "./app.jar")]);
    let tmp = project(&text, &[("app.jar", "PK")]);
    let settings = BuildSettings::default();
    let runtime = MockRuntime::new();
    let installer = MockInstaller::new();
    let mut run = build_run(&tmp, vec![Stage::Build]);

    let report = BuildOrchestrator::new(&runtime, &installer, &settings)
        .run(&mut run)
        .await
        .unwrap();

    assert!(matches!(
        report.advisories.as_slice(),
        [Advisory::ArchiveCodeUri { function, .. }] if function == "svcA/fnA"
    ));
    assert_eq!(report.skipped.len(), 1);
}
