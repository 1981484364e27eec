//! Shared access signature issuance
//!
//! Issues read-only, container-scoped service SAS tokens signed with a
//! storage account key through the Blob Storage SDK.

use azure_storage::prelude::BlobSasPermissions;
use azure_storage::shared_access_signature::SasToken;
use azure_storage_blobs::prelude::ContainerClient;
use chrono::{DateTime, Duration, Utc};
use time::OffsetDateTime;

use super::models::StorageAccountKey;
use crate::blob::manager::keyed_container_client;
use crate::error::{BlobstageError, Result};

/// Validity window of a read-only token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SasPolicy {
    pub start: DateTime<Utc>,
    pub expiry: DateTime<Utc>,
}

impl SasPolicy {
    /// Read-only policy starting `start_skew_minutes` before `now`.
    ///
    /// The expiry is measured from the skewed start, not from `now`.
    pub fn read_only(now: DateTime<Utc>, start_skew_minutes: i64, expiry_minutes: i64) -> Result<Self> {
        if expiry_minutes <= 0 {
            return Err(BlobstageError::invalid_argument(format!(
                "SAS expiry must be a positive number of minutes, got {}",
                expiry_minutes
            )));
        }
        if start_skew_minutes < 0 {
            return Err(BlobstageError::invalid_argument(format!(
                "SAS start skew must not be negative, got {}",
                start_skew_minutes
            )));
        }

        let start = minutes(start_skew_minutes)
            .and_then(|skew| now.checked_sub_signed(skew))
            .ok_or_else(|| out_of_range("start", start_skew_minutes))?;
        let expiry = minutes(expiry_minutes)
            .and_then(|window| start.checked_add_signed(window))
            .ok_or_else(|| out_of_range("expiry", expiry_minutes))?;

        Ok(Self { start, expiry })
    }

    pub fn permissions(&self) -> BlobSasPermissions {
        BlobSasPermissions {
            read: true,
            ..Default::default()
        }
    }

    /// Whether `at` falls inside `[start, expiry)`
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.expiry
    }
}

fn minutes(value: i64) -> Option<Duration> {
    Duration::try_minutes(value)
}

fn out_of_range(field: &str, value: i64) -> BlobstageError {
    BlobstageError::invalid_argument(format!(
        "SAS {} of {} minutes is out of range",
        field, value
    ))
}

fn to_offset(at: DateTime<Utc>) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(at.timestamp())
        .map_err(|e| BlobstageError::invalid_argument(format!("SAS time {}: {}", at, e)))
}

/// Issued token together with the container URL that carries it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SasGrant {
    pub token: String,
    pub url: String,
    pub policy: SasPolicy,
}

impl SasGrant {
    pub async fn issue(
        policy: SasPolicy,
        account: &str,
        container: &str,
        key: &StorageAccountKey,
    ) -> Result<Self> {
        let client = keyed_container_client(account, container, key);
        Self::issue_for(&client, policy).await
    }

    /// Sign `policy` for the container `client` points at
    pub async fn issue_for(client: &ContainerClient, policy: SasPolicy) -> Result<Self> {
        let signature = client
            .shared_access_signature(policy.permissions(), to_offset(policy.expiry)?)
            .await
            .map_err(|e| BlobstageError::invalid_argument(format!("SAS signing failed: {}", e)))?
            .start(to_offset(policy.start)?);

        let token = signature.token().map_err(|e| {
            BlobstageError::invalid_argument(format!(
                "Storage account key for '{}' cannot sign a SAS: {}",
                client.container_name(),
                e
            ))
        })?;
        let url = container_sas_url(client, &signature)?;

        Ok(Self { token, url, policy })
    }
}

/// Container URL carrying a SAS token.
///
/// The URL names the container, not a blob; clients append
/// `/<blob name>` to the path before the query string.
pub fn container_sas_url<T: SasToken>(client: &ContainerClient, signature: &T) -> Result<String> {
    client
        .generate_signed_container_url(signature)
        .map(|url| url.to_string())
        .map_err(|e| BlobstageError::invalid_argument(format!("Invalid container URL: {}", e)))
}
