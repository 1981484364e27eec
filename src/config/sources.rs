//! Parameter sources
//!
//! A task run reads its logical parameters (`resourceGroupName`,
//! `servicePrincipalId`, ...) from one of three places: the pipeline agent's
//! input bindings, plain environment variables in development mode, or a
//! parameters file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Somewhere logical task parameters can be read from
pub trait ParameterSource: Send + Sync {
    /// Read a task input
    fn input(&self, name: &str) -> Option<String>;

    /// Read a data field of the connected service endpoint
    fn endpoint_data(&self, endpoint: &str, key: &str) -> Option<String>;

    /// Read an authorization field of the connected service endpoint
    fn endpoint_auth(&self, endpoint: &str, key: &str) -> Option<String>;

    /// Whether endpoint fields are scoped by a connected service id
    fn uses_service_endpoints(&self) -> bool {
        false
    }

    /// Short name used in log messages
    fn describe(&self) -> &'static str;
}

/// Treat empty and whitespace-only values as absent
fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

/// Input bindings exposed to a task process by the pipeline agent
#[derive(Debug, Clone, Default)]
pub struct PipelineInputs {
    vars: HashMap<String, String>,
}

impl PipelineInputs {
    /// Snapshot the current process environment
    pub fn from_env() -> Self {
        Self::from_map(std::env::vars().collect())
    }

    pub fn from_map(vars: HashMap<String, String>) -> Self {
        Self { vars }
    }

    /// Name of the variable carrying a task input
    pub fn input_variable(name: &str) -> String {
        format!("INPUT_{}", name.replace(' ', "_").to_uppercase())
    }

    /// Name of the variable carrying an endpoint data field
    pub fn endpoint_data_variable(endpoint: &str, key: &str) -> String {
        format!("ENDPOINT_DATA_{}_{}", endpoint, key.to_uppercase())
    }

    /// Name of the variable carrying an endpoint authorization field
    pub fn endpoint_auth_variable(endpoint: &str, key: &str) -> String {
        format!("ENDPOINT_AUTH_PARAMETER_{}_{}", endpoint, key.to_uppercase())
    }
}

impl ParameterSource for PipelineInputs {
    fn input(&self, name: &str) -> Option<String> {
        non_empty(self.vars.get(&Self::input_variable(name)))
    }

    fn endpoint_data(&self, endpoint: &str, key: &str) -> Option<String> {
        non_empty(self.vars.get(&Self::endpoint_data_variable(endpoint, key)))
    }

    fn endpoint_auth(&self, endpoint: &str, key: &str) -> Option<String> {
        non_empty(self.vars.get(&Self::endpoint_auth_variable(endpoint, key)))
    }

    fn uses_service_endpoints(&self) -> bool {
        true
    }

    fn describe(&self) -> &'static str {
        "pipeline inputs"
    }
}

/// Development mode: every parameter comes from the environment variable
/// named by upper-casing the logical parameter name
#[derive(Debug, Clone, Default)]
pub struct EnvironmentSource {
    vars: HashMap<String, String>,
}

impl EnvironmentSource {
    pub fn from_env() -> Self {
        Self::from_map(std::env::vars().collect())
    }

    pub fn from_map(vars: HashMap<String, String>) -> Self {
        Self { vars }
    }

    fn lookup(&self, name: &str) -> Option<String> {
        non_empty(self.vars.get(&name.to_uppercase()))
    }
}

impl ParameterSource for EnvironmentSource {
    fn input(&self, name: &str) -> Option<String> {
        self.lookup(name)
    }

    fn endpoint_data(&self, _endpoint: &str, key: &str) -> Option<String> {
        self.lookup(key)
    }

    fn endpoint_auth(&self, _endpoint: &str, key: &str) -> Option<String> {
        self.lookup(key)
    }

    fn describe(&self) -> &'static str {
        "environment variables"
    }
}

/// Flat parameters file (TOML, JSON or YAML) keyed by logical parameter name
#[derive(Debug, Clone, Default)]
pub struct FileSource {
    values: HashMap<String, String>,
}

impl FileSource {
    /// Load a parameters file; keys are matched case-insensitively
    pub fn load(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?;
        let values: HashMap<String, String> = settings.try_deserialize()?;
        Ok(Self::from_map(values))
    }

    pub fn from_map(values: HashMap<String, String>) -> Self {
        let values = values
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        Self { values }
    }

    fn lookup(&self, name: &str) -> Option<String> {
        non_empty(self.values.get(&name.to_lowercase()))
    }
}

impl ParameterSource for FileSource {
    fn input(&self, name: &str) -> Option<String> {
        self.lookup(name)
    }

    fn endpoint_data(&self, _endpoint: &str, key: &str) -> Option<String> {
        self.lookup(key)
    }

    fn endpoint_auth(&self, _endpoint: &str, key: &str) -> Option<String> {
        self.lookup(key)
    }

    fn describe(&self) -> &'static str {
        "parameters file"
    }
}

/// Which parameter source a run should use
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Pipeline,
    Environment,
    File(PathBuf),
}

impl SourceKind {
    /// Resolve the source for a run.
    ///
    /// Priority: parameters file > explicit source > `NODE_ENV=dev` > pipeline inputs
    pub fn resolve(
        explicit: Option<SourceKind>,
        params_file: Option<PathBuf>,
        node_env: Option<&str>,
    ) -> Self {
        if let Some(path) = params_file {
            return SourceKind::File(path);
        }

        if let Some(kind) = explicit {
            return kind;
        }

        match node_env {
            Some(value) if value.trim().eq_ignore_ascii_case("dev") => SourceKind::Environment,
            _ => SourceKind::Pipeline,
        }
    }

    /// Development mode is any run that is not reading pipeline inputs
    pub fn is_dev(&self) -> bool {
        !matches!(self, SourceKind::Pipeline)
    }

    /// Open the source against the current process environment or file system
    pub fn open(&self) -> Result<Box<dyn ParameterSource>> {
        let source: Box<dyn ParameterSource> = match self {
            SourceKind::Pipeline => Box::new(PipelineInputs::from_env()),
            SourceKind::Environment => Box::new(EnvironmentSource::from_env()),
            SourceKind::File(path) => Box::new(FileSource::load(path)?),
        };
        Ok(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_pipeline_variable_names() {
        assert_eq!(
            PipelineInputs::input_variable("resourceGroupName"),
            "INPUT_RESOURCEGROUPNAME"
        );
        assert_eq!(
            PipelineInputs::input_variable("upload directory"),
            "INPUT_UPLOAD_DIRECTORY"
        );
        assert_eq!(
            PipelineInputs::endpoint_data_variable("svc-1", "SubscriptionId"),
            "ENDPOINT_DATA_svc-1_SUBSCRIPTIONID"
        );
        assert_eq!(
            PipelineInputs::endpoint_auth_variable("svc-1", "tenantId"),
            "ENDPOINT_AUTH_PARAMETER_svc-1_TENANTID"
        );
    }

    #[test]
    fn test_pipeline_inputs_ignore_blank_values() {
        let source = PipelineInputs::from_map(map(&[
            ("INPUT_LOCATION", "westeurope"),
            ("INPUT_CONTAINERNAME", "   "),
        ]));
        assert_eq!(source.input("location").as_deref(), Some("westeurope"));
        assert_eq!(source.input("containerName"), None);
        assert_eq!(source.input("storageAccountName"), None);
    }

    #[test]
    fn test_environment_source_upper_cases_names() {
        let source = EnvironmentSource::from_map(map(&[
            ("RESOURCEGROUPNAME", "rg-dev"),
            ("SERVICEPRINCIPALID", "client"),
        ]));
        assert_eq!(source.input("resourceGroupName").as_deref(), Some("rg-dev"));
        assert_eq!(
            source.endpoint_auth("ignored", "servicePrincipalId").as_deref(),
            Some("client")
        );
        assert!(!source.uses_service_endpoints());
    }

    #[test]
    fn test_file_source_matches_keys_case_insensitively() {
        let source = FileSource::from_map(map(&[("ResourceGroupName", "rg-file")]));
        assert_eq!(source.input("resourceGroupName").as_deref(), Some("rg-file"));
    }

    #[test]
    fn test_file_source_loads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.toml");
        std::fs::write(
            &path,
            "resourceGroupName = \"rg-toml\"\nsasTokenExpiryTime = \"24h\"\n",
        )
        .unwrap();

        let source = FileSource::load(&path).unwrap();
        assert_eq!(source.input("resourceGroupName").as_deref(), Some("rg-toml"));
        assert_eq!(source.input("sasTokenExpiryTime").as_deref(), Some("24h"));
    }

    #[test]
    fn test_source_resolution_precedence() {
        let file = PathBuf::from("params.toml");
        assert_eq!(
            SourceKind::resolve(Some(SourceKind::Pipeline), Some(file.clone()), Some("dev")),
            SourceKind::File(file)
        );
        assert_eq!(
            SourceKind::resolve(Some(SourceKind::Pipeline), None, Some("DEV")),
            SourceKind::Pipeline
        );
        assert_eq!(
            SourceKind::resolve(None, None, Some("Dev")),
            SourceKind::Environment
        );
        assert_eq!(
            SourceKind::resolve(None, None, Some("production")),
            SourceKind::Pipeline
        );
        assert_eq!(SourceKind::resolve(None, None, None), SourceKind::Pipeline);
    }
}
