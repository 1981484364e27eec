//! Authentication provider trait and implementations
//!
//! This module defines the authentication provider trait and provides
//! implementations for service-principal and ambient Azure credentials.

use async_trait::async_trait;
use azure_core::auth::{AccessToken, TokenCredential};
use azure_identity::{ClientSecretCredential, DefaultAzureCredential, TokenCredentialOptions};
use std::sync::Arc;

use crate::config::ServicePrincipal;
use crate::error::{BlobstageError, Result};

/// Authority host used for service principal sign-in
pub const AZURE_PUBLIC_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Trait for Azure authentication providers
#[async_trait]
pub trait AzureAuthProvider: Send + Sync {
    /// Get an access token for the specified scopes
    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken>;

    /// Human-readable description of the credential in use
    fn describe(&self) -> String;
}

/// Default Azure Credential Provider using DefaultAzureCredential
pub struct DefaultAzureCredentialProvider {
    credential: Arc<DefaultAzureCredential>,
}

impl DefaultAzureCredentialProvider {
    /// Create a new DefaultAzureCredentialProvider
    pub fn new() -> Result<Self> {
        let credential = Arc::new(
            DefaultAzureCredential::create(TokenCredentialOptions::default()).map_err(|e| {
                BlobstageError::authentication(format!(
                    "Failed to create DefaultAzureCredential: {}",
                    e
                ))
            })?,
        );

        Ok(Self { credential })
    }
}

#[async_trait]
impl AzureAuthProvider for DefaultAzureCredentialProvider {
    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken> {
        self.credential
            .get_token(scopes)
            .await
            .map_err(|e| BlobstageError::authentication(format!("Failed to get token: {}", e)))
    }

    fn describe(&self) -> String {
        "default Azure credential chain".to_string()
    }
}

/// Client Secret Authentication Provider backed by a connected service principal
pub struct ClientSecretProvider {
    credential: Arc<ClientSecretCredential>,
    tenant_id: String,
    client_id: String,
}

impl ClientSecretProvider {
    /// Create a new ClientSecretProvider
    pub fn new(principal: &ServicePrincipal) -> Result<Self> {
        let authority_url = url::Url::parse(AZURE_PUBLIC_AUTHORITY)
            .map_err(|e| BlobstageError::config(format!("Invalid authority URL: {}", e)))?;

        let credential = Arc::new(ClientSecretCredential::new(
            azure_core::new_http_client(),
            authority_url,
            principal.tenant_id.clone(),
            principal.client_id.clone(),
            principal.client_secret().to_string(),
        ));

        Ok(Self {
            credential,
            tenant_id: principal.tenant_id.clone(),
            client_id: principal.client_id.clone(),
        })
    }
}

#[async_trait]
impl AzureAuthProvider for ClientSecretProvider {
    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken> {
        self.credential
            .get_token(scopes)
            .await
            .map_err(|e| BlobstageError::authentication(format!("Failed to get token: {}", e)))
    }

    fn describe(&self) -> String {
        format!(
            "service principal {} in tenant {}",
            self.client_id, self.tenant_id
        )
    }
}

/// Build the authentication provider for a run.
///
/// A connected service principal is used when present; otherwise the
/// ambient credential chain (Azure CLI, managed identity, environment).
pub fn create_auth_provider(
    principal: Option<&ServicePrincipal>,
) -> Result<Arc<dyn AzureAuthProvider>> {
    let provider: Arc<dyn AzureAuthProvider> = match principal {
        Some(principal) => Arc::new(ClientSecretProvider::new(principal)?),
        None => Arc::new(DefaultAzureCredentialProvider::new()?),
    };

    tracing::debug!("Authenticating with {}", provider.describe());
    Ok(provider)
}
