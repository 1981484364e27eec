//! Task parameter loading
//!
//! This module turns a [`ParameterSource`] into validated [`TaskParameters`].
//! Every field required by the selected action is checked here so that a
//! missing value fails the run before any Azure call is made.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use zeroize::Zeroizing;

use super::sources::ParameterSource;
use crate::error::{BlobstageError, Result};
use crate::utils::duration::parse_minutes;

/// Logical parameter names understood by the loader
pub mod names {
    pub const CONNECTED_SERVICE: &str = "ConnectedServiceName";
    pub const SUBSCRIPTION_ID: &str = "SubscriptionId";
    pub const CLIENT_ID: &str = "servicePrincipalId";
    pub const CLIENT_SECRET: &str = "servicePrincipalKey";
    pub const TENANT_ID: &str = "tenantId";
    pub const ACTION: &str = "action";
    pub const RESOURCE_GROUP: &str = "resourceGroupName";
    pub const LOCATION: &str = "location";
    pub const STORAGE_ACCOUNT: &str = "storageAccountName";
    pub const STORAGE_ACCOUNT_TYPE: &str = "storageAccountType";
    pub const CONTAINER: &str = "containerName";
    pub const UPLOAD_DIRECTORY: &str = "uploadDirectory";
    pub const SAS_START: &str = "sasTokenStartTime";
    pub const SAS_EXPIRY: &str = "sasTokenExpiryTime";
    pub const OUTPUT_VARIABLE: &str = "vstsSasTokenVariableName";
    pub const MAX_CONCURRENT_UPLOADS: &str = "maxConcurrentUploads";
}

pub const DEFAULT_STORAGE_ACCOUNT_TYPE: &str = "Standard_LRS";
pub const DEFAULT_MAX_CONCURRENT_UPLOADS: usize = 4;
/// Upper bound for the SAS start skew and validity window (one year).
pub const MAX_SAS_MINUTES: i64 = 365 * 24 * 60;

/// Action selected for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Delete,
}

impl FromStr for Action {
    type Err = BlobstageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "create" => Ok(Action::Create),
            "delete" => Ok(Action::Delete),
            _ => Err(BlobstageError::InvalidAction(s.to_string())),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Create => write!(f, "create"),
            Action::Delete => write!(f, "delete"),
        }
    }
}

/// Service principal credentials taken from the connected service
#[derive(Clone)]
pub struct ServicePrincipal {
    pub client_id: String,
    client_secret: Zeroizing<String>,
    pub tenant_id: String,
}

impl ServicePrincipal {
    pub fn new(client_id: &str, client_secret: &str, tenant_id: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_secret: Zeroizing::new(client_secret.to_string()),
            tenant_id: tenant_id.to_string(),
        }
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }
}

impl fmt::Debug for ServicePrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServicePrincipal")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("tenant_id", &self.tenant_id)
            .finish()
    }
}

/// Everything a run needs, validated for the selected action
#[derive(Debug, Clone)]
pub struct TaskParameters {
    pub action: Action,
    pub subscription_id: String,
    pub resource_group_name: String,
    pub location: String,
    /// `None` means the ambient Azure credential chain is used
    pub credentials: Option<ServicePrincipal>,
    pub storage_account_name: String,
    pub storage_account_type: String,
    pub container_name: String,
    pub upload_directory: PathBuf,
    pub sas_start_skew_minutes: i64,
    pub sas_expiry_minutes: i64,
    pub output_variable: Option<String>,
    pub max_concurrent_uploads: usize,
    pub is_dev: bool,
}

/// Loads [`TaskParameters`] from a parameter source
pub struct ParameterLoader {
    source: Box<dyn ParameterSource>,
    is_dev: bool,
}

impl ParameterLoader {
    pub fn new(source: Box<dyn ParameterSource>, is_dev: bool) -> Self {
        Self { source, is_dev }
    }

    /// Load and validate parameters. `action_override` beats the `action` input.
    pub fn load(&self, action_override: Option<Action>) -> Result<TaskParameters> {
        tracing::debug!("Reading task parameters from {}", self.source.describe());

        let action = match action_override {
            Some(action) => action,
            None => self.required_input(names::ACTION)?.parse()?,
        };

        let connected_service = if self.source.uses_service_endpoints() {
            self.required_input(names::CONNECTED_SERVICE)?
        } else {
            self.source
                .input(names::CONNECTED_SERVICE)
                .unwrap_or_default()
        };

        let subscription_id = self
            .source
            .endpoint_data(&connected_service, names::SUBSCRIPTION_ID)
            .ok_or_else(|| BlobstageError::missing_parameter(names::SUBSCRIPTION_ID))?;

        let credentials = self.load_credentials(&connected_service)?;
        let resource_group_name = self.required_input(names::RESOURCE_GROUP)?;
        let output_variable = self.source.input(names::OUTPUT_VARIABLE);
        let max_concurrent_uploads = self.load_concurrency()?;

        let mut params = TaskParameters {
            action,
            subscription_id,
            resource_group_name,
            location: String::new(),
            credentials,
            storage_account_name: String::new(),
            storage_account_type: self
                .source
                .input(names::STORAGE_ACCOUNT_TYPE)
                .unwrap_or_else(|| DEFAULT_STORAGE_ACCOUNT_TYPE.to_string()),
            container_name: String::new(),
            upload_directory: PathBuf::new(),
            sas_start_skew_minutes: 0,
            sas_expiry_minutes: 0,
            output_variable,
            max_concurrent_uploads,
            is_dev: self.is_dev,
        };

        if action == Action::Create {
            params.location = self.required_input(names::LOCATION)?;
            params.storage_account_name = self.required_input(names::STORAGE_ACCOUNT)?;
            params.container_name = self.required_input(names::CONTAINER)?;
            params.upload_directory = PathBuf::from(self.required_input(names::UPLOAD_DIRECTORY)?);
            params.sas_start_skew_minutes = self.required_minutes(names::SAS_START, 0)?;
            params.sas_expiry_minutes = self.required_minutes(names::SAS_EXPIRY, 1)?;
        } else {
            params.location = self.source.input(names::LOCATION).unwrap_or_default();
        }

        Ok(params)
    }

    fn required_input(&self, name: &str) -> Result<String> {
        self.source
            .input(name)
            .ok_or_else(|| BlobstageError::missing_parameter(name))
    }

    /// Duration input in whole minutes, within `min..=MAX_SAS_MINUTES`.
    fn required_minutes(&self, name: &str, min: i64) -> Result<i64> {
        let raw = self.required_input(name)?;
        let minutes = parse_minutes(&raw)
            .map_err(|e| BlobstageError::config(format!("Parameter '{}': {}", name, e)))?;
        if minutes < min || minutes > MAX_SAS_MINUTES {
            return Err(BlobstageError::config(format!(
                "Parameter '{}' must be between {} and {} minutes, got '{}'",
                name, min, MAX_SAS_MINUTES, raw
            )));
        }
        Ok(minutes)
    }

    fn load_concurrency(&self) -> Result<usize> {
        match self.source.input(names::MAX_CONCURRENT_UPLOADS) {
            None => Ok(DEFAULT_MAX_CONCURRENT_UPLOADS),
            Some(raw) => match raw.parse::<usize>() {
                Ok(value) if value > 0 => Ok(value),
                _ => Err(BlobstageError::config(format!(
                    "Parameter '{}' must be a positive integer, got '{}'",
                    names::MAX_CONCURRENT_UPLOADS,
                    raw
                ))),
            },
        }
    }

    fn load_credentials(&self, connected_service: &str) -> Result<Option<ServicePrincipal>> {
        let client_id = self.source.endpoint_auth(connected_service, names::CLIENT_ID);
        let client_secret = self
            .source
            .endpoint_auth(connected_service, names::CLIENT_SECRET);
        let tenant_id = self.source.endpoint_auth(connected_service, names::TENANT_ID);

        match (client_id, client_secret, tenant_id) {
            (Some(id), Some(secret), Some(tenant)) => {
                Ok(Some(ServicePrincipal::new(&id, &secret, &tenant)))
            }
            (None, None, None) if !self.source.uses_service_endpoints() => Ok(None),
            (id, secret, _) => {
                let missing = if id.is_none() {
                    names::CLIENT_ID
                } else if secret.is_none() {
                    names::CLIENT_SECRET
                } else {
                    names::TENANT_ID
                };
                Err(BlobstageError::missing_parameter(missing))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::sources::{EnvironmentSource, PipelineInputs};
    use std::collections::HashMap;

    fn dev_vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        let mut vars: HashMap<String, String> = [
            ("SUBSCRIPTIONID", "sub-123"),
            ("SERVICEPRINCIPALID", "client"),
            ("SERVICEPRINCIPALKEY", "secret"),
            ("TENANTID", "tenant"),
            ("ACTION", "create"),
            ("RESOURCEGROUPNAME", "rg-test"),
            ("LOCATION", "westeurope"),
            ("STORAGEACCOUNTNAME", "stblobstage"),
            ("CONTAINERNAME", "artifacts"),
            ("UPLOADDIRECTORY", "/tmp/out"),
            ("SASTOKENSTARTTIME", "5m"),
            ("SASTOKENEXPIRYTIME", "24h"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (k, v) in pairs {
            vars.insert(k.to_string(), v.to_string());
        }
        vars
    }

    fn load_dev(vars: HashMap<String, String>) -> Result<TaskParameters> {
        ParameterLoader::new(Box::new(EnvironmentSource::from_map(vars)), true).load(None)
    }

    #[test]
    fn test_action_parsing() {
        assert_eq!("create".parse::<Action>().unwrap(), Action::Create);
        assert_eq!(" Delete ".parse::<Action>().unwrap(), Action::Delete);
        assert!(matches!(
            "destroy".parse::<Action>(),
            Err(BlobstageError::InvalidAction(a)) if a == "destroy"
        ));
    }

    #[test]
    fn test_load_create_parameters() {
        let params = load_dev(dev_vars(&[])).unwrap();
        assert_eq!(params.action, Action::Create);
        assert_eq!(params.subscription_id, "sub-123");
        assert_eq!(params.storage_account_type, DEFAULT_STORAGE_ACCOUNT_TYPE);
        assert_eq!(params.sas_start_skew_minutes, 5);
        assert_eq!(params.sas_expiry_minutes, 1440);
        assert_eq!(params.max_concurrent_uploads, DEFAULT_MAX_CONCURRENT_UPLOADS);
        assert_eq!(params.output_variable, None);
        assert!(params.is_dev);
        assert_eq!(params.credentials.unwrap().client_secret(), "secret");
    }

    #[test]
    fn test_missing_required_field_is_named() {
        let mut vars = dev_vars(&[]);
        vars.remove("CONTAINERNAME");
        match load_dev(vars) {
            Err(BlobstageError::MissingParameter { name }) => assert_eq!(name, "containerName"),
            other => panic!("expected missing parameter, got {:?}", other),
        }
    }

    #[test]
    fn test_delete_does_not_need_storage_fields() {
        let vars: HashMap<String, String> = dev_vars(&[("ACTION", "delete")])
            .into_iter()
            .filter(|(k, _)| {
                !matches!(
                    k.as_str(),
                    "STORAGEACCOUNTNAME" | "CONTAINERNAME" | "UPLOADDIRECTORY" | "SASTOKENSTARTTIME"
                )
            })
            .collect();
        let params = load_dev(vars).unwrap();
        assert_eq!(params.action, Action::Delete);
        assert_eq!(params.resource_group_name, "rg-test");
    }

    #[test]
    fn test_action_override_wins() {
        let params = ParameterLoader::new(
            Box::new(EnvironmentSource::from_map(dev_vars(&[("ACTION", "create")]))),
            true,
        )
        .load(Some(Action::Delete))
        .unwrap();
        assert_eq!(params.action, Action::Delete);
    }

    #[test]
    fn test_invalid_action_is_configuration_error() {
        assert!(matches!(
            load_dev(dev_vars(&[("ACTION", "update")])),
            Err(BlobstageError::InvalidAction(_))
        ));
    }

    #[test]
    fn test_invalid_duration_and_concurrency() {
        assert!(matches!(
            load_dev(dev_vars(&[("SASTOKENEXPIRYTIME", "tomorrow")])),
            Err(BlobstageError::ConfigError(_))
        ));
        assert!(matches!(
            load_dev(dev_vars(&[("SASTOKENSTARTTIME", "-5")])),
            Err(BlobstageError::ConfigError(_))
        ));
        assert!(matches!(
            load_dev(dev_vars(&[("MAXCONCURRENTUPLOADS", "0")])),
            Err(BlobstageError::ConfigError(_))
        ));
    }

    #[test]
    fn test_sas_durations_are_bounded() {
        for (name, value) in [
            ("SASTOKENEXPIRYTIME", "0m"),
            ("SASTOKENEXPIRYTIME", "99999999999w"),
            ("SASTOKENEXPIRYTIME", "366d"),
            ("SASTOKENSTARTTIME", "99999999999w"),
        ] {
            match load_dev(dev_vars(&[(name, value)])) {
                Err(BlobstageError::ConfigError(msg)) => assert!(msg.contains(value), "{msg}"),
                other => panic!("{name}={value} should be rejected, got {other:?}"),
            }
        }

        let params = load_dev(dev_vars(&[
            ("SASTOKENSTARTTIME", "0m"),
            ("SASTOKENEXPIRYTIME", "365d"),
        ]))
        .unwrap();
        assert_eq!(params.sas_start_skew_minutes, 0);
        assert_eq!(params.sas_expiry_minutes, MAX_SAS_MINUTES);
    }

    #[test]
    fn test_dev_mode_without_principal_uses_ambient_credentials() {
        let vars: HashMap<String, String> = dev_vars(&[])
            .into_iter()
            .filter(|(k, _)| !matches!(k.as_str(), "SERVICEPRINCIPALID" | "SERVICEPRINCIPALKEY" | "TENANTID"))
            .collect();
        let params = load_dev(vars).unwrap();
        assert!(params.credentials.is_none());
    }

    #[test]
    fn test_partial_principal_is_rejected() {
        let mut vars = dev_vars(&[]);
        vars.remove("TENANTID");
        match load_dev(vars) {
            Err(BlobstageError::MissingParameter { name }) => assert_eq!(name, "tenantId"),
            other => panic!("expected missing tenant, got {:?}", other),
        }
    }

    #[test]
    fn test_pipeline_inputs_resolve_connected_service() {
        let vars: HashMap<String, String> = [
            ("INPUT_CONNECTEDSERVICENAME", "svc"),
            ("ENDPOINT_DATA_svc_SUBSCRIPTIONID", "sub-pipeline"),
            ("ENDPOINT_AUTH_PARAMETER_svc_SERVICEPRINCIPALID", "client"),
            ("ENDPOINT_AUTH_PARAMETER_svc_SERVICEPRINCIPALKEY", "secret"),
            ("ENDPOINT_AUTH_PARAMETER_svc_TENANTID", "tenant"),
            ("INPUT_ACTION", "delete"),
            ("INPUT_RESOURCEGROUPNAME", "rg-pipeline"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let params = ParameterLoader::new(Box::new(PipelineInputs::from_map(vars)), false)
            .load(None)
            .unwrap();
        assert_eq!(params.subscription_id, "sub-pipeline");
        assert_eq!(params.resource_group_name, "rg-pipeline");
        assert!(!params.is_dev);
        assert_eq!(params.credentials.unwrap().tenant_id, "tenant");
    }

    #[test]
    fn test_pipeline_requires_connected_service_and_principal() {
        let vars: HashMap<String, String> = [
            ("INPUT_ACTION", "delete"),
            ("INPUT_RESOURCEGROUPNAME", "rg"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        match ParameterLoader::new(Box::new(PipelineInputs::from_map(vars)), false).load(None) {
            Err(BlobstageError::MissingParameter { name }) => {
                assert_eq!(name, "ConnectedServiceName")
            }
            other => panic!("expected missing connected service, got {:?}", other),
        }
    }

    #[test]
    fn test_debug_output_redacts_secret() {
        let principal = ServicePrincipal::new("client", "super-secret", "tenant");
        let rendered = format!("{:?}", principal);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("super-secret"));
    }
}
