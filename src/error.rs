use std::fmt;
use thiserror::Error;

/// Step of the provisioning or teardown workflow that produced a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    ResourceGroupStatus,
    ResourceGroupCreation,
    ResourceGroupDeletion,
    StorageAccountStatus,
    StorageAccountCreation,
    ContainerStatus,
    ContainerCreation,
    SasIssuance,
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::ResourceGroupStatus => "Unable to determine if the resource group exists",
            Self::ResourceGroupCreation => "Failed to create the resource group",
            Self::ResourceGroupDeletion => "Failed to delete the resource group",
            Self::StorageAccountStatus => "Unable to determine if the storage account exists",
            Self::StorageAccountCreation => "Failed to create the storage account",
            Self::ContainerStatus => "Unable to determine if the storage container exists",
            Self::ContainerCreation => "Failed to create the storage container",
            Self::SasIssuance => "Failed to issue the SAS token",
        };
        f.write_str(text)
    }
}

/// Main error type for blobstage operations
#[derive(Debug, Error)]
pub enum BlobstageError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Required parameter '{name}' was not supplied")]
    MissingParameter { name: String },

    #[error("Invalid action '{0}': expected 'create' or 'delete'")]
    InvalidAction(String),

    #[error("{step}: {details}")]
    StepFailed { step: ProvisionStep, details: String },

    #[error("Unable to list files under '{path}': {details}")]
    EnumerationFailed { path: String, details: String },

    #[error("Failed to upload '{name}' to the container: {details}")]
    UploadFailed { name: String, details: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Connection timeout: {0}")]
    ConnectionTimeout(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration loading error: {0}")]
    ConfigLoadError(#[from] config::ConfigError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl BlobstageError {
    pub fn authentication<S: Into<String>>(msg: S) -> Self {
        Self::AuthenticationError(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn missing_parameter<S: Into<String>>(name: S) -> Self {
        Self::MissingParameter { name: name.into() }
    }

    pub fn step_failed<S: Into<String>>(step: ProvisionStep, details: S) -> Self {
        Self::StepFailed {
            step,
            details: details.into(),
        }
    }

    pub fn enumeration_failed<P: Into<String>, S: Into<String>>(path: P, details: S) -> Self {
        Self::EnumerationFailed {
            path: path.into(),
            details: details.into(),
        }
    }

    pub fn upload_failed<N: Into<String>, S: Into<String>>(name: N, details: S) -> Self {
        Self::UploadFailed {
            name: name.into(),
            details: details.into(),
        }
    }

    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::NetworkError(msg.into())
    }

    pub fn connection_timeout<S: Into<String>>(msg: S) -> Self {
        Self::ConnectionTimeout(msg.into())
    }

    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// The workflow step this error belongs to, if any
    pub fn step(&self) -> Option<ProvisionStep> {
        match self {
            Self::StepFailed { step, .. } => Some(*step),
            _ => None,
        }
    }
}

/// Result type alias for blobstage operations
pub type Result<T> = std::result::Result<T, BlobstageError>;
