//! Deployment template access and mutation.
//!
//! The document is kept as a [`serde_yaml::Value`] so properties funcraft
//! does not understand survive a load/rewrite/save cycle untouched.

use serde_yaml::{Mapping, Value};
use std::path::{Component, Path, PathBuf};

use crate::resource::{FunctionBuildTarget, FunctionResource, NasConfig, Runtime, ServiceResource};

const SERVICE_TYPE: &str = "Aliyun::Serverless::Service";
const FUNCTION_TYPE: &str = "Aliyun::Serverless::Function";

/// A loaded `template.yml`.
#[derive(Debug, Clone)]
pub struct Template {
    document: Value,
}

/// Outcome of [`Template::rewrite_for_artifacts`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteSummary {
    /// `service/function` names whose CodeUri now points at an artifact dir
    pub rewritten: Vec<String>,
    /// `service/function` names left unbuilt with their original CodeUri
    pub unbuilt: Vec<String>,
}

impl Template {
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| crate::Error::TemplateRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content).map_err(|e| crate::Error::TemplateParse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
        let document = serde_yaml::from_str(content)?;
        Ok(Self { document })
    }

    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_yaml::to_string(&self.document)
            .map_err(|e| crate::Error::TemplateSerialize { source: e })?;
        std::fs::write(path, content).map_err(|e| crate::Error::TemplateWrite {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Resolves the functions selected by `build_name`, in declaration order.
    ///
    /// - `None`: every function of every service
    /// - `"svc/fn"`: exactly that function
    /// - `"name"`: all functions of service `name`, or every function named `name`
    pub fn find_build_targets(
        &self,
        build_name: Option<&str>,
    ) -> crate::Result<Vec<FunctionBuildTarget>> {
        let mut targets = Vec::new();

        for (service_name, service_value) in self.services()? {
            let service = parse_service(service_name, service_value)?;

            for (function_name, function_value) in functions_of(service_value) {
                if !matches_build_name(build_name, service_name, function_name) {
                    continue;
                }
                let function = parse_function(service_name, function_name, function_value)?;
                targets.push(FunctionBuildTarget {
                    service_name: service_name.to_owned(),
                    function_name: function_name.to_owned(),
                    service: service.clone(),
                    function,
                });
            }
        }

        match build_name {
            Some(name) if targets.is_empty() => {
                Err(crate::Error::NoMatchingFunction(name.to_owned()))
            }
            _ => Ok(targets),
        }
    }

    /// Points each built function's `CodeUri` at its artifact directory.
    ///
    /// New values are relative to `base_dir` when the artifact directory lies
    /// under it. Skipped functions keep their CodeUri and are reported as unbuilt.
    pub fn rewrite_for_artifacts(
        &mut self,
        built: &[(FunctionBuildTarget, PathBuf)],
        skipped: &[FunctionBuildTarget],
        base_dir: &Path,
    ) -> crate::Result<RewriteSummary> {
        let mut summary = RewriteSummary::default();

        for (target, artifact_dir) in built {
            let code_uri = relative_code_uri(base_dir, artifact_dir);
            let properties = self.function_properties_mut(target)?;
            properties.insert(Value::from("CodeUri"), Value::from(code_uri));
            summary.rewritten.push(target.qualified_name());
        }

        for target in skipped {
            tracing::debug!(
                function = %target.qualified_name(),
                "leaving CodeUri of unbuilt function"
            );
            summary.unbuilt.push(target.qualified_name());
        }

        Ok(summary)
    }

    /// `CodeUri` of every function in the template, selected or not.
    pub fn code_uris(&self) -> crate::Result<Vec<&str>> {
        let mut uris = Vec::new();
        for (_, service) in self.services()? {
            for (_, function) in functions_of(service) {
                let code_uri = function
                    .get("Properties")
                    .and_then(|p| p.get("CodeUri"))
                    .and_then(Value::as_str);
                if let Some(code_uri) = code_uri {
                    uris.push(code_uri);
                }
            }
        }
        Ok(uris)
    }

    /// Current `CodeUri` of a function, if declared.
    pub fn code_uri(&self, service_name: &str, function_name: &str) -> Option<&str> {
        self.document
            .get("Resources")?
            .get(service_name)?
            .get(function_name)?
            .get("Properties")?
            .get("CodeUri")?
            .as_str()
    }

    fn services(&self) -> crate::Result<impl Iterator<Item = (&str, &Value)>> {
        let resources = self
            .document
            .get("Resources")
            .and_then(Value::as_mapping)
            .ok_or(crate::Error::MissingResources)?;

        Ok(resources.iter().filter_map(|(key, value)| {
            let name = key.as_str()?;
            (resource_type(value) == Some(SERVICE_TYPE)).then_some((name, value))
        }))
    }

    fn function_properties_mut(
        &mut self,
        target: &FunctionBuildTarget,
    ) -> crate::Result<&mut Mapping> {
        let not_found = || crate::Error::FunctionNotFound {
            service: target.service_name.clone(),
            function: target.function_name.clone(),
        };

        let function = self
            .document
            .get_mut("Resources")
            .and_then(|r| r.get_mut(target.service_name.as_str()))
            .and_then(|s| s.get_mut(target.function_name.as_str()))
            .and_then(Value::as_mapping_mut)
            .ok_or_else(not_found)?;

        let properties = function
            .entry(Value::from("Properties"))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        properties.as_mapping_mut().ok_or_else(not_found)
    }
}

fn resource_type(value: &Value) -> Option<&str> {
    value.get("Type").and_then(Value::as_str)
}

fn functions_of(service: &Value) -> impl Iterator<Item = (&str, &Value)> {
    service
        .as_mapping()
        .into_iter()
        .flat_map(|mapping| mapping.iter())
        .filter_map(|(key, value)| {
            let name = key.as_str()?;
            (resource_type(value) == Some(FUNCTION_TYPE)).then_some((name, value))
        })
}

fn matches_build_name(build_name: Option<&str>, service: &str, function: &str) -> bool {
    match build_name {
        None => true,
        Some(name) => match name.split_once('/') {
            Some((svc, func)) => svc == service && func == function,
            None => name == service || name == function,
        },
    }
}

fn parse_service(name: &str, value: &Value) -> crate::Result<ServiceResource> {
    let nas_config = value
        .get("Properties")
        .and_then(|p| p.get("NasConfig"))
        .map(NasConfig::from_value)
        .transpose()
        .map_err(|e| crate::Error::InvalidNasConfig {
            service: name.to_owned(),
            source: e,
        })?;
    Ok(ServiceResource { nas_config })
}

fn parse_function(service: &str, function: &str, value: &Value) -> crate::Result<FunctionResource> {
    let properties = value.get("Properties");
    let property = |key: &str| properties.and_then(|p| p.get(key)).and_then(Value::as_str);
    let missing = |property: &'static str| crate::Error::MissingProperty {
        service: service.to_owned(),
        function: function.to_owned(),
        property,
    };

    let runtime = property("Runtime").ok_or_else(|| missing("Runtime"))?;
    let code_uri = property("CodeUri").ok_or_else(|| missing("CodeUri"))?;

    Ok(FunctionResource {
        runtime: Runtime::new(runtime),
        code_uri: code_uri.to_owned(),
        handler: property("Handler").map(str::to_owned),
    })
}

/// Forward-slash path of `target` relative to `base`, or `target` itself
/// when it is not under `base`.
fn relative_code_uri(base: &Path, target: &Path) -> String {
    let relative = target.strip_prefix(base).unwrap_or(target);
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            Component::RootDir => Some(String::new()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        ".".to_owned()
    } else {
        parts.join("/")
    }
}
