//! Provisioning and teardown workflows
//!
//! Provisioning ensures a resource group, storage account and container
//! exist, then issues a fresh read-only SAS token for the container.
//! Teardown deletes the resource group if it is present.
//!
//! Failure policy:
//! - resource group check/create failures abort the run
//! - storage account check/create failures are logged and the run continues
//! - container "not found" is a normal negative result; any other check
//!   failure aborts the run, while a creation failure is logged
//! - SAS issuance failures abort the run

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::models::{ProviderErrorKind, StorageAccountCreateRequest, StorageAccountKey};
use super::operations::ResourceOperations;
use super::sas::{SasGrant, SasPolicy};
use crate::config::TaskParameters;
use crate::error::{BlobstageError, ProvisionStep, Result};

/// The resources a provisioning run targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionTarget {
    pub resource_group: String,
    pub location: String,
    pub storage_account: String,
    pub storage_account_type: String,
    pub container: String,
    pub sas_start_skew_minutes: i64,
    pub sas_expiry_minutes: i64,
}

impl From<&TaskParameters> for ProvisionTarget {
    fn from(params: &TaskParameters) -> Self {
        Self {
            resource_group: params.resource_group_name.clone(),
            location: params.location.clone(),
            storage_account: params.storage_account_name.clone(),
            storage_account_type: params.storage_account_type.clone(),
            container: params.container_name.clone(),
            sas_start_skew_minutes: params.sas_start_skew_minutes,
            sas_expiry_minutes: params.sas_expiry_minutes,
        }
    }
}

/// What a provisioning run did along the way
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    pub resource_group_created: bool,
    pub storage_account_created: bool,
    /// Logged, non-fatal storage account failure
    pub storage_account_error: Option<String>,
    pub container_created: bool,
    /// Logged, non-fatal container creation failure
    pub container_error: Option<String>,
}

/// Result of a successful provisioning run
#[derive(Debug, Clone)]
pub struct Provisioned {
    pub grant: SasGrant,
    /// Key the token was signed with; also used for uploads
    pub account_key: StorageAccountKey,
    pub report: ProvisionReport,
}

/// Idempotent provisioning of the storage target
pub struct ProvisioningWorkflow {
    ops: Arc<dyn ResourceOperations>,
    target: ProvisionTarget,
}

impl ProvisioningWorkflow {
    pub fn new(ops: Arc<dyn ResourceOperations>, target: ProvisionTarget) -> Self {
        Self { ops, target }
    }

    /// Run every step and issue a token valid from now
    pub async fn provision(&self) -> Result<Provisioned> {
        self.provision_at(Utc::now()).await
    }

    /// Run every step, computing the token window relative to `now`
    pub async fn provision_at(&self, now: DateTime<Utc>) -> Result<Provisioned> {
        let mut report = ProvisionReport {
            resource_group_created: self.ensure_resource_group().await?,
            ..ProvisionReport::default()
        };

        match self.ensure_storage_account().await {
            Ok(created) => report.storage_account_created = created,
            Err(e) => {
                error!("{}", e);
                report.storage_account_error = Some(e.to_string());
            }
        }

        match self.ensure_container().await {
            Ok(created) => report.container_created = created,
            Err(e) if e.step() == Some(ProvisionStep::ContainerCreation) => {
                error!("{}", e);
                report.container_error = Some(e.to_string());
            }
            Err(e) => return Err(e),
        }

        let (grant, account_key) = self.issue_sas(now).await?;

        Ok(Provisioned {
            grant,
            account_key,
            report,
        })
    }

    /// Returns whether the resource group was created by this call
    async fn ensure_resource_group(&self) -> Result<bool> {
        let name = &self.target.resource_group;
        info!("Checking if resource group '{}' exists", name);

        let exists = self
            .ops
            .resource_group_exists(name)
            .await
            .map_err(|e| BlobstageError::step_failed(ProvisionStep::ResourceGroupStatus, e.to_string()))?;
        info!("Resource group exists: {}", exists);

        if exists {
            return Ok(false);
        }

        info!("Creating resource group '{}' in '{}'", name, self.target.location);
        self.ops
            .create_resource_group(name, &self.target.location)
            .await
            .map_err(|e| BlobstageError::step_failed(ProvisionStep::ResourceGroupCreation, e.to_string()))?;
        info!("Created resource group '{}'", name);

        Ok(true)
    }

    /// Returns whether the storage account was created by this call
    async fn ensure_storage_account(&self) -> Result<bool> {
        let name = &self.target.storage_account;
        info!("Checking if storage account '{}' exists", name);

        let availability = self
            .ops
            .check_storage_account_name(name)
            .await
            .map_err(|e| {
                tracing::debug!("Raw name availability failure: {:?}", e);
                BlobstageError::step_failed(ProvisionStep::StorageAccountStatus, e.to_string())
            })?;
        info!(
            "Storage account name available: {} ({})",
            availability.name_available,
            availability.reason.as_deref().unwrap_or("no reason given")
        );

        // An unavailable name may belong to another subscription; it is
        // treated as in use and not investigated further.
        if availability.account_exists() {
            return Ok(false);
        }

        info!("Creating storage account '{}'", name);
        let request = StorageAccountCreateRequest::new(
            name,
            &self.target.location,
            &self.target.storage_account_type,
        );
        self.ops
            .create_storage_account(&self.target.resource_group, &request)
            .await
            .map_err(|e| {
                tracing::debug!("Raw storage account creation failure: {:?}", e);
                BlobstageError::step_failed(ProvisionStep::StorageAccountCreation, e.to_string())
            })?;
        info!("Created storage account '{}'", name);

        Ok(true)
    }

    /// Returns whether the container was created by this call
    async fn ensure_container(&self) -> Result<bool> {
        let container = &self.target.container;
        info!("Checking if container '{}' exists", container);

        let exists = match self
            .ops
            .get_container(&self.target.resource_group, &self.target.storage_account, container)
            .await
        {
            Ok(()) => true,
            Err(e) if e.kind() == ProviderErrorKind::ContainerNotFound => false,
            Err(e) => {
                return Err(BlobstageError::step_failed(
                    ProvisionStep::ContainerStatus,
                    e.to_string(),
                ))
            }
        };
        info!("Container exists: {}", exists);

        if exists {
            return Ok(false);
        }

        info!("Creating container '{}'", container);
        self.ops
            .create_container(&self.target.resource_group, &self.target.storage_account, container)
            .await
            .map_err(|e| {
                tracing::debug!("Raw container creation failure: {:?}", e);
                BlobstageError::step_failed(ProvisionStep::ContainerCreation, e.to_string())
            })?;
        info!("Created container '{}'", container);

        Ok(true)
    }

    async fn issue_sas(&self, now: DateTime<Utc>) -> Result<(SasGrant, StorageAccountKey)> {
        let keys = self
            .ops
            .list_account_keys(&self.target.resource_group, &self.target.storage_account)
            .await
            .map_err(|e| BlobstageError::step_failed(ProvisionStep::SasIssuance, e.to_string()))?;

        let key = keys.into_iter().next().ok_or_else(|| {
            BlobstageError::step_failed(
                ProvisionStep::SasIssuance,
                format!(
                    "storage account '{}' returned no access keys",
                    self.target.storage_account
                ),
            )
        })?;

        let policy = SasPolicy::read_only(
            now,
            self.target.sas_start_skew_minutes,
            self.target.sas_expiry_minutes,
        )
        .map_err(|e| BlobstageError::step_failed(ProvisionStep::SasIssuance, e.to_string()))?;
        info!("SAS token start: {}", policy.start.to_rfc2822());
        info!("SAS token expiry: {}", policy.expiry.to_rfc2822());

        let grant = SasGrant::issue(
            policy,
            &self.target.storage_account,
            &self.target.container,
            &key,
        )
        .await
        .map_err(|e| BlobstageError::step_failed(ProvisionStep::SasIssuance, e.to_string()))?;

        Ok((grant, key))
    }
}

/// Idempotent removal of the resource group
pub struct TeardownWorkflow {
    ops: Arc<dyn ResourceOperations>,
    resource_group: String,
}

impl TeardownWorkflow {
    pub fn new(ops: Arc<dyn ResourceOperations>, resource_group: String) -> Self {
        Self {
            ops,
            resource_group,
        }
    }

    /// Delete the resource group if it exists. Returns whether a delete was issued.
    pub async fn teardown(&self) -> Result<bool> {
        let name = &self.resource_group;
        info!("Checking if resource group '{}' exists", name);

        let exists = self
            .ops
            .resource_group_exists(name)
            .await
            .map_err(|e| BlobstageError::step_failed(ProvisionStep::ResourceGroupStatus, e.to_string()))?;
        info!("Resource group exists: {}", exists);

        if !exists {
            info!("Resource group '{}' is already gone", name);
            return Ok(false);
        }

        warn!(
            "Deleting resource group '{}' and every resource it contains; this cannot be undone",
            name
        );
        self.ops
            .delete_resource_group(name)
            .await
            .map_err(|e| BlobstageError::step_failed(ProvisionStep::ResourceGroupDeletion, e.to_string()))?;
        info!("Deleted resource group '{}'", name);

        Ok(true)
    }
}
