//! Resource models
//!
//! Request and response shapes for the Azure Resource Manager calls the
//! provisioning workflow makes, plus the provider error type.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

/// Message prefix the storage service uses when a container is absent
pub const CONTAINER_NOT_FOUND_PREFIX: &str = "The specified container does not";

/// Storage account kind used for newly created accounts
pub const STORAGE_ACCOUNT_KIND: &str = "Storage";

/// Error reported by the provider for a single call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub status: Option<u16>,
    pub code: Option<String>,
    pub message: String,
}

/// Closed set of provider error shapes the workflow branches on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    ContainerNotFound,
    Other,
}

impl ProviderError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            status: None,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, code: Option<String>, message: String) -> Self {
        Self {
            status: Some(status),
            code,
            message,
        }
    }

    /// Classify the error. Container absence is recognised by message text
    /// only; this is the one place that text is inspected.
    pub fn kind(&self) -> ProviderErrorKind {
        if self.message.starts_with(CONTAINER_NOT_FOUND_PREFIX) {
            ProviderErrorKind::ContainerNotFound
        } else {
            ProviderErrorKind::Other
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {}: {}", status, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ProviderError {}

impl From<crate::error::BlobstageError> for ProviderError {
    fn from(error: crate::error::BlobstageError) -> Self {
        ProviderError::new(error.to_string())
    }
}

/// Result of a storage account name availability check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameAvailability {
    pub name_available: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl NameAvailability {
    /// An unavailable name is treated as an account that already exists
    pub fn account_exists(&self) -> bool {
        !self.name_available
    }
}

/// Request for creating a storage account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageAccountCreateRequest {
    pub name: String,
    pub location: String,
    pub sku: String,
    pub kind: String,
}

impl StorageAccountCreateRequest {
    pub fn new(name: &str, location: &str, sku: &str) -> Self {
        Self {
            name: name.to_string(),
            location: location.to_string(),
            sku: sku.to_string(),
            kind: STORAGE_ACCOUNT_KIND.to_string(),
        }
    }
}

/// Storage account access key
#[derive(Clone)]
pub struct StorageAccountKey {
    pub key_name: String,
    value: Zeroizing<String>,
}

impl StorageAccountKey {
    pub fn new(key_name: &str, value: &str) -> Self {
        Self {
            key_name: key_name.to_string(),
            value: Zeroizing::new(value.to_string()),
        }
    }

    /// The base64 key material
    pub fn secret(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for StorageAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageAccountKey")
            .field("key_name", &self.key_name)
            .field("value", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListKeysResponse {
    #[serde(default)]
    pub keys: Vec<ListedKey>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListedKey {
    pub key_name: String,
    pub value: String,
}
