use funcraft_build::conversion::{
    GENERATED_DOCKERFILE, materialize_container_build_script, resolve_build_script,
};
use funcraft_build::funfile::{ConversionError, legacy_to_funfile};
use funcraft_core::{BuildSettings, Runtime};
use std::collections::BTreeSet;
use std::path::Path;
use tempfile::TempDir;

const FUN_YML: &str = r#"
runtime: python3
tasks:
  - apt-get: libzbar0
  - pip: Pillow flask
    local: false
  - shell: |-
      ./configure
      make
"#;

fn file_names(dir: &Path) -> BTreeSet<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

// ── resolve_build_script ──

#[test]
fn returns_none_without_any_build_config() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("index.py"), "").unwrap();

    assert!(resolve_build_script(tmp.path()).unwrap().is_none());
    assert!(!tmp.path().join("Funfile").exists());
}

#[test]
fn returns_existing_funfile_untouched() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("Funfile"), "RUNTIME python3\nRUN echo hi\n").unwrap();
    std::fs::write(tmp.path().join("fun.yml"), FUN_YML).unwrap();

    let path = resolve_build_script(tmp.path()).unwrap().unwrap();

    assert_eq!(path, tmp.path().join("Funfile"));
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "RUNTIME python3\nRUN echo hi\n"
    );
}

#[test]
fn converts_fun_yml_into_funfile() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("fun.yml"), FUN_YML).unwrap();

    let path = resolve_build_script(tmp.path()).unwrap().unwrap();
    let funfile = std::fs::read_to_string(&path).unwrap();

    assert!(funfile.starts_with("RUNTIME python3\n"));
    assert!(funfile.contains("RUN fun-install apt-get install libzbar0"));
    assert!(funfile.contains("RUN pip install Pillow flask"));
    assert!(funfile.contains("RUN ./configure && \\\n    make"));
}

#[test]
fn conversion_happens_at_most_once() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("fun.yml"), FUN_YML).unwrap();

    let first = resolve_build_script(tmp.path()).unwrap().unwrap();
    let converted = std::fs::read_to_string(&first).unwrap();

    // A changed fun.yml must not be re-converted once a Funfile exists
    std::fs::write(tmp.path().join("fun.yml"), "runtime: nodejs12\n").unwrap();
    let second = resolve_build_script(tmp.path()).unwrap().unwrap();

    assert_eq!(first, second);
    assert_eq!(std::fs::read_to_string(&second).unwrap(), converted);
}

#[test]
fn invalid_fun_yml_is_a_parse_error() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("fun.yml"), "tasks: [").unwrap();

    let result = resolve_build_script(tmp.path());
    assert!(matches!(result, Err(ConversionError::ParseLegacy { .. })));
    assert!(!tmp.path().join("Funfile").exists());
}

#[test]
fn task_declaring_two_tools_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("fun.yml");
    std::fs::write(
        &path,
        "runtime: python3\ntasks:\n  - pip: flask\n  - pip: x\n    npm: y\n",
    )
    .unwrap();

    let result = legacy_to_funfile(&path);
    assert!(matches!(result, Err(ConversionError::InvalidTask { index: 1, .. })));
}

// ── materialize_container_build_script ──

#[test]
fn dockerfile_uses_runtime_image_and_labels() {
    let tmp = TempDir::new().unwrap();
    let funfile = tmp.path().join("Funfile");
    std::fs::write(&funfile, "RUNTIME python3\nRUN fun-install pip install flask\n").unwrap();

    let settings = BuildSettings::default();
    let generated = materialize_container_build_script(
        &funfile,
        &Runtime::new("python3"),
        "svcA",
        "fnA",
        &settings,
    )
    .unwrap();

    assert_eq!(generated.path(), tmp.path().join(GENERATED_DOCKERFILE));
    let dockerfile = std::fs::read_to_string(generated.path()).unwrap();
    assert!(dockerfile.starts_with("FROM aliyunfc/runtime-python3:build-"));
    assert!(dockerfile.contains(r#"funcraft.service="svcA""#));
    assert!(dockerfile.contains(r#"funcraft.function="fnA""#));
    assert!(dockerfile.contains("WORKDIR /code"));
    assert!(dockerfile.contains("COPY . /code"));
    assert!(dockerfile.contains("RUN fun-install pip install flask"));
    assert!(!dockerfile.contains("RUNTIME"));
}

#[test]
fn dockerfile_keeps_explicit_code_copy() {
    let tmp = TempDir::new().unwrap();
    let funfile = tmp.path().join("Funfile");
    std::fs::write(&funfile, "RUNTIME nodejs12\nCOPY ./src /code\nRUN npm ci\n").unwrap();

    let generated = materialize_container_build_script(
        &funfile,
        &Runtime::new("nodejs12"),
        "svc",
        "fn",
        &BuildSettings::default(),
    )
    .unwrap();

    let dockerfile = std::fs::read_to_string(generated.path()).unwrap();
    assert!(!dockerfile.contains("COPY . /code"));
    assert!(dockerfile.contains("COPY ./src /code"));
}

#[test]
fn funfile_without_runtime_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let funfile = tmp.path().join("Funfile");
    std::fs::write(&funfile, "RUN echo hi\n").unwrap();

    let result = materialize_container_build_script(
        &funfile,
        &Runtime::new("python3"),
        "svc",
        "fn",
        &BuildSettings::default(),
    );

    assert!(matches!(result, Err(ConversionError::MissingRuntime(_))));
    assert!(!tmp.path().join(GENERATED_DOCKERFILE).exists());
}

#[test]
fn generated_dockerfile_removed_on_drop() {
    let tmp = TempDir::new().unwrap();
    let funfile = tmp.path().join("Funfile");
    std::fs::write(&funfile, "RUNTIME python3\n").unwrap();

    {
        let generated = materialize_container_build_script(
            &funfile,
            &Runtime::new("python3"),
            "svc",
            "fn",
            &BuildSettings::default(),
        )
        .unwrap();
        assert!(generated.path().exists());
    }

    assert!(!tmp.path().join(GENERATED_DOCKERFILE).exists());
}

#[test]
fn conversion_round_trip_leaves_only_funfile_behind() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("fun.yml"), FUN_YML).unwrap();
    std::fs::write(tmp.path().join("index.py"), "def handler(e, c): pass").unwrap();
    let before = file_names(tmp.path());

    let funfile = resolve_build_script(tmp.path()).unwrap().unwrap();
    let generated = materialize_container_build_script(
        &funfile,
        &Runtime::new("python3"),
        "svc",
        "fn",
        &BuildSettings::default(),
    )
    .unwrap();
    generated.remove().unwrap();

    let mut expected = before;
    expected.insert("Funfile".to_owned());
    assert_eq!(file_names(tmp.path()), expected);
}
