use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid [build].{key} {path:?}: {reason}")]
    InvalidSettingPath {
        key: &'static str,
        path: String,
        reason: &'static str,
    },

    // ── Template ──
    #[error("failed to read template {path}")]
    TemplateRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse template {path}")]
    TemplateParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("failed to write template {path}")]
    TemplateWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize template")]
    TemplateSerialize { source: serde_yaml::Error },

    #[error("template has no `Resources` section")]
    MissingResources,

    #[error("function {service}/{function} is missing required property `{property}`")]
    MissingProperty {
        service: String,
        function: String,
        property: &'static str,
    },

    #[error("invalid NasConfig on service {service}")]
    InvalidNasConfig {
        service: String,
        source: serde_yaml::Error,
    },

    #[error("no function matches build name '{0}' in template")]
    NoMatchingFunction(String),

    #[error("function {service}/{function} not found in template")]
    FunctionNotFound { service: String, function: String },

    #[error("no build stage requested")]
    NoStages,
}
