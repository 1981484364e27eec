//! Blob transfer client
//!
//! Uploads single blobs into the provisioned container, authenticating with
//! the storage account key the SAS token was signed with.

use async_trait::async_trait;
use azure_storage::StorageCredentials;
use azure_storage_blobs::prelude::*;
use tracing::debug;

use crate::error::{BlobstageError, Result};
use crate::resources::models::StorageAccountKey;

/// Transfers raw bytes into a container under a given key
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobUploader: Send + Sync {
    /// Write `content` unmodified as block blob `name`, replacing any existing blob
    async fn upload_blob(&self, name: &str, content: Vec<u8>) -> Result<()>;
}

/// Container client authenticated with a storage account key
pub fn keyed_container_client(
    storage_account: &str,
    container_name: &str,
    key: &StorageAccountKey,
) -> ContainerClient {
    let credentials =
        StorageCredentials::access_key(storage_account.to_string(), key.secret().to_string());
    BlobServiceClient::new(storage_account, credentials).container_client(container_name)
}

/// Uploader backed by the Azure Blob Storage SDK
pub struct AzureBlobUploader {
    container_client: ContainerClient,
}

impl AzureBlobUploader {
    pub fn new(storage_account: &str, container_name: &str, key: &StorageAccountKey) -> Self {
        Self {
            container_client: keyed_container_client(storage_account, container_name, key),
        }
    }
}

#[async_trait]
impl BlobUploader for AzureBlobUploader {
    async fn upload_blob(&self, name: &str, content: Vec<u8>) -> Result<()> {
        let content_type = mime_guess::from_path(name)
            .first_or_octet_stream()
            .to_string();
        let content_length = content.len();

        let response = self
            .container_client
            .blob_client(name)
            .put_block_blob(content)
            .content_type(content_type)
            .await
            .map_err(|e| BlobstageError::upload_failed(name, e.to_string()))?;

        debug!(
            "Uploaded '{}' ({} bytes, etag {})",
            name, content_length, response.etag
        );
        Ok(())
    }
}
