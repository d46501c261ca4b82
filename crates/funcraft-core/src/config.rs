use serde::{Deserialize, Serialize};
use std::path::{Component, Path};

/// funcraft.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FuncraftConfig {
    #[serde(default)]
    pub build: BuildSettings,
}

/// Well-known paths and image naming used by a build run.
///
/// All paths are relative: `artifacts_dir` and `default_nas_dir` to the
/// project base directory, `nas_dir` to an artifact directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSettings {
    /// Root artifact directory for `build` runs
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: String,
    /// Subpath where installers leave NAS output inside an artifact directory
    #[serde(default = "default_nas_dir")]
    pub nas_dir: String,
    /// Local directory that NAS mounts are staged into
    #[serde(default = "default_local_nas_dir")]
    pub default_nas_dir: String,
    /// Registry prefix of the runtime build images
    #[serde(default = "default_image_prefix")]
    pub image_prefix: String,
    /// Tag of the runtime build images
    #[serde(default = "default_image_tag")]
    pub image_tag: String,
    /// Prefix for locally built cache image tags
    #[serde(default = "default_tag_prefix")]
    pub tag_prefix: String,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            artifacts_dir: default_artifacts_dir(),
            nas_dir: default_nas_dir(),
            default_nas_dir: default_local_nas_dir(),
            image_prefix: default_image_prefix(),
            image_tag: default_image_tag(),
            tag_prefix: default_tag_prefix(),
        }
    }
}

impl BuildSettings {
    /// Build image for a runtime, e.g. `aliyunfc/runtime-python3:build-1.9.4`.
    pub fn build_image(&self, runtime: &str) -> String {
        format!(
            "{prefix}/runtime-{runtime}:build-{tag}",
            prefix = self.image_prefix,
            tag = self.image_tag,
        )
    }
}

impl BuildSettings {
    /// Rejects directory settings that would resolve to the base directory,
    /// one of its ancestors, or a location outside it.
    ///
    /// These directories are emptied with `remove_dir_all` during a run.
    pub fn validate(&self) -> crate::Result<()> {
        let dirs = [
            ("artifacts_dir", &self.artifacts_dir),
            ("nas_dir", &self.nas_dir),
            ("default_nas_dir", &self.default_nas_dir),
        ];
        for (key, path) in dirs {
            check_relative_dir(path).map_err(|reason| crate::Error::InvalidSettingPath {
                key,
                path: path.clone(),
                reason,
            })?;
        }
        Ok(())
    }
}

/// Checks that `path` names a directory strictly below whatever it is joined to.
pub fn check_relative_dir(path: &str) -> Result<(), &'static str> {
    let mut has_normal = false;
    for component in Path::new(path).components() {
        match component {
            Component::Normal(_) => has_normal = true,
            Component::CurDir => {}
            Component::ParentDir => return Err("must not contain `..`"),
            Component::RootDir | Component::Prefix(_) => return Err("must be a relative path"),
        }
    }
    if has_normal {
        Ok(())
    } else {
        Err("must name a subdirectory")
    }
}

impl FuncraftConfig {
    /// Load from funcraft.toml in the given directory, or return defaults if not found.
    pub fn load(base_dir: &Path) -> crate::Result<Self> {
        let config_path = base_dir.join("funcraft.toml");
        if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).map_err(|e| crate::Error::ConfigLoad {
                    path: config_path.clone(),
                    source: e,
                })?;
            let config: Self =
                toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
                    path: config_path,
                    source: e,
                })?;
            config.build.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }
}

fn default_artifacts_dir() -> String {
    ".fun/build/artifacts".to_owned()
}

fn default_nas_dir() -> String {
    ".fun/nas".to_owned()
}

fn default_local_nas_dir() -> String {
    ".fun/nas".to_owned()
}

fn default_image_prefix() -> String {
    "aliyunfc".to_owned()
}

fn default_image_tag() -> String {
    "1.9.4".to_owned()
}

fn default_tag_prefix() -> String {
    "funcraft-cache".to_owned()
}
