//! Azure Resource Manager operations
//!
//! This module provides the provider calls used by the provisioning and
//! teardown workflows: resource groups, storage accounts, blob containers
//! and account keys.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, LOCATION, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::models::{
    ListKeysResponse, NameAvailability, ProviderError, StorageAccountCreateRequest,
    StorageAccountKey,
};
use crate::auth::provider::AzureAuthProvider;
use crate::error::Result;
use crate::utils::network::{classify_network_error, create_http_client, NetworkConfig};

pub const ARM_ENDPOINT: &str = "https://management.azure.com";
pub const ARM_SCOPE: &str = "https://management.azure.com/.default";
pub const RESOURCES_API_VERSION: &str = "2021-04-01";
pub const STORAGE_API_VERSION: &str = "2023-01-01";

/// Polling interval for long-running operations that do not send Retry-After
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Provider calls the workflows depend on
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResourceOperations: Send + Sync {
    /// Check whether a resource group exists in the subscription
    async fn resource_group_exists(&self, name: &str) -> ProviderResult<bool>;

    /// Create a resource group
    async fn create_resource_group(&self, name: &str, location: &str) -> ProviderResult<()>;

    /// Delete a resource group and everything in it
    async fn delete_resource_group(&self, name: &str) -> ProviderResult<()>;

    /// Check storage account name availability across the provider
    async fn check_storage_account_name(&self, name: &str) -> ProviderResult<NameAvailability>;

    /// Create a storage account
    async fn create_storage_account(
        &self,
        resource_group: &str,
        request: &StorageAccountCreateRequest,
    ) -> ProviderResult<()>;

    /// Fetch container metadata; absence surfaces as a provider error
    async fn get_container(
        &self,
        resource_group: &str,
        account: &str,
        container: &str,
    ) -> ProviderResult<()>;

    /// Create a blob container
    async fn create_container(
        &self,
        resource_group: &str,
        account: &str,
        container: &str,
    ) -> ProviderResult<()>;

    /// List the storage account's access keys
    async fn list_account_keys(
        &self,
        resource_group: &str,
        account: &str,
    ) -> ProviderResult<Vec<StorageAccountKey>>;
}

/// Azure Resource Manager implementation over REST
pub struct AzureResourceOperations {
    auth_provider: Arc<dyn AzureAuthProvider>,
    http_client: Client,
    subscription_id: String,
    endpoint: String,
    poll_interval: Duration,
}

impl AzureResourceOperations {
    /// Create a new instance for one subscription against the public ARM endpoint
    pub fn new(auth_provider: Arc<dyn AzureAuthProvider>, subscription_id: String) -> Result<Self> {
        let network_config = NetworkConfig::default();
        let http_client = create_http_client(&network_config)?;

        Ok(Self {
            auth_provider,
            http_client,
            subscription_id,
            endpoint: ARM_ENDPOINT.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Send management calls to `endpoint` instead of the public cloud
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Wait used between long-running operation polls without Retry-After
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Create authorized headers for Azure REST API
    async fn create_headers(&self) -> ProviderResult<HeaderMap> {
        let token = self.auth_provider.get_token(&[ARM_SCOPE]).await?;

        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", token.token.secret()))
            .map_err(|e| ProviderError::new(format!("Invalid token format: {}", e)))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let request_id = HeaderValue::from_str(&Uuid::new_v4().to_string())
            .map_err(|e| ProviderError::new(format!("Invalid request id: {}", e)))?;
        headers.insert("x-ms-client-request-id", request_id);
        Ok(headers)
    }

    /// Build Azure Resource Manager URL
    fn build_arm_url(&self, path: &str, api_version: &str) -> String {
        format!("{}{}?api-version={}", self.endpoint, path, api_version)
    }

    fn resource_group_path(&self, name: &str) -> String {
        format!(
            "/subscriptions/{}/resourcegroups/{}",
            self.subscription_id, name
        )
    }

    fn storage_account_path(&self, resource_group: &str, account: &str) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Storage/storageAccounts/{}",
            self.subscription_id, resource_group, account
        )
    }

    fn container_path(&self, resource_group: &str, account: &str, container: &str) -> String {
        format!(
            "{}/blobServices/default/containers/{}",
            self.storage_account_path(resource_group, account),
            container
        )
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> ProviderResult<Response> {
        request
            .send()
            .await
            .map_err(|e| ProviderError::from(classify_network_error(&e, url)))
    }

    /// Parse an Azure error envelope into a provider error
    fn parse_azure_error(status: u16, body: &str) -> ProviderError {
        if let Ok(error_json) = serde_json::from_str::<Value>(body) {
            if let Some(error) = error_json.get("error") {
                let code = error
                    .get("code")
                    .and_then(|c| c.as_str())
                    .map(|c| c.to_string());
                if let Some(message) = error.get("message").and_then(|m| m.as_str()) {
                    return ProviderError::with_status(status, code, message.to_string());
                }
            }
        }

        let message = if body.trim().is_empty() {
            StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("Unknown error")
                .to_string()
        } else {
            body.to_string()
        };
        ProviderError::with_status(status, None, message)
    }

    async fn error_from_response(response: Response) -> ProviderError {
        let status_code = response.status().as_u16();
        let error_body = response.text().await.unwrap_or_default();
        Self::parse_azure_error(status_code, &error_body)
    }

    /// Follow a long-running operation until the provider stops answering 202
    async fn wait_for_completion(&self, mut response: Response) -> ProviderResult<()> {
        loop {
            let status = response.status();
            if status != StatusCode::ACCEPTED {
                if status.is_success() {
                    return Ok(());
                }
                return Err(Self::error_from_response(response).await);
            }

            let location = match response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
            {
                Some(location) => location.to_string(),
                None => return Ok(()),
            };

            let delay = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(self.poll_interval);

            tracing::debug!("Operation in progress, polling again in {:?}", delay);
            tokio::time::sleep(delay).await;

            let headers = self.create_headers().await?;
            response = self
                .send(self.http_client.get(&location).headers(headers), &location)
                .await?;
        }
    }
}

#[async_trait]
impl ResourceOperations for AzureResourceOperations {
    async fn resource_group_exists(&self, name: &str) -> ProviderResult<bool> {
        let headers = self.create_headers().await?;
        let url = self.build_arm_url(&self.resource_group_path(name), RESOURCES_API_VERSION);

        let response = self
            .send(self.http_client.head(&url).headers(headers), &url)
            .await?;

        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(Self::error_from_response(response).await),
        }
    }

    async fn create_resource_group(&self, name: &str, location: &str) -> ProviderResult<()> {
        let headers = self.create_headers().await?;
        let url = self.build_arm_url(&self.resource_group_path(name), RESOURCES_API_VERSION);
        let body = json!({
            "name": name,
            "location": location,
        });

        let response = self
            .send(self.http_client.put(&url).headers(headers).json(&body), &url)
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        Ok(())
    }

    async fn delete_resource_group(&self, name: &str) -> ProviderResult<()> {
        let headers = self.create_headers().await?;
        let url = self.build_arm_url(&self.resource_group_path(name), RESOURCES_API_VERSION);

        let response = self
            .send(self.http_client.delete(&url).headers(headers), &url)
            .await?;

        self.wait_for_completion(response).await
    }

    async fn check_storage_account_name(&self, name: &str) -> ProviderResult<NameAvailability> {
        let headers = self.create_headers().await?;
        let url = self.build_arm_url(
            &format!(
                "/subscriptions/{}/providers/Microsoft.Storage/checkNameAvailability",
                self.subscription_id
            ),
            STORAGE_API_VERSION,
        );
        let body = json!({
            "name": name,
            "type": "Microsoft.Storage/storageAccounts",
        });

        let response = self
            .send(self.http_client.post(&url).headers(headers).json(&body), &url)
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        response.json::<NameAvailability>().await.map_err(|e| {
            ProviderError::new(format!("Failed to parse name availability response: {}", e))
        })
    }

    async fn create_storage_account(
        &self,
        resource_group: &str,
        request: &StorageAccountCreateRequest,
    ) -> ProviderResult<()> {
        let headers = self.create_headers().await?;
        let url = self.build_arm_url(
            &self.storage_account_path(resource_group, &request.name),
            STORAGE_API_VERSION,
        );
        let body = json!({
            "location": request.location,
            "sku": { "name": request.sku },
            "kind": request.kind,
        });

        let response = self
            .send(self.http_client.put(&url).headers(headers).json(&body), &url)
            .await?;

        self.wait_for_completion(response).await
    }

    async fn get_container(
        &self,
        resource_group: &str,
        account: &str,
        container: &str,
    ) -> ProviderResult<()> {
        let headers = self.create_headers().await?;
        let url = self.build_arm_url(
            &self.container_path(resource_group, account, container),
            STORAGE_API_VERSION,
        );

        let response = self
            .send(self.http_client.get(&url).headers(headers), &url)
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        Ok(())
    }

    async fn create_container(
        &self,
        resource_group: &str,
        account: &str,
        container: &str,
    ) -> ProviderResult<()> {
        let headers = self.create_headers().await?;
        let url = self.build_arm_url(
            &self.container_path(resource_group, account, container),
            STORAGE_API_VERSION,
        );
        let body = json!({ "properties": {} });

        let response = self
            .send(self.http_client.put(&url).headers(headers).json(&body), &url)
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        Ok(())
    }

    async fn list_account_keys(
        &self,
        resource_group: &str,
        account: &str,
    ) -> ProviderResult<Vec<StorageAccountKey>> {
        let headers = self.create_headers().await?;
        let url = self.build_arm_url(
            &format!(
                "{}/listKeys",
                self.storage_account_path(resource_group, account)
            ),
            STORAGE_API_VERSION,
        );

        let response = self
            .send(self.http_client.post(&url).headers(headers).json(&json!({})), &url)
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let listed: ListKeysResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::new(format!("Failed to parse account keys: {}", e)))?;

        Ok(listed
            .keys
            .iter()
            .map(|k| StorageAccountKey::new(&k.key_name, &k.value))
            .collect())
    }
}
