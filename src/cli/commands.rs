//! CLI commands and argument parsing
//!
//! This module defines the command-line surface using clap and runs the
//! selected action end to end.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::auth::create_auth_provider;
use crate::blob::{upload_directory, AzureBlobUploader, BlobUploader, UploadSummary};
use crate::config::{Action, ParameterLoader, SourceKind, TaskParameters};
use crate::error::{BlobstageError, Result};
use crate::pipeline::{publish_sas, TaskHost};
use crate::resources::{
    AzureResourceOperations, ProvisionTarget, ProvisioningWorkflow, ResourceOperations, SasGrant,
    TeardownWorkflow,
};

/// Where task parameters are read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceArg {
    /// Pipeline agent input bindings
    Pipeline,
    /// Development mode: plain environment variables
    Env,
    /// A parameters file (requires --params-file)
    File,
}

#[derive(Parser, Debug)]
#[command(name = "blobstage")]
#[command(about = "Provision Azure blob storage, upload a directory and issue a read-only SAS URL")]
#[command(version, author)]
pub struct Cli {
    /// Action to run, overriding the 'action' parameter (create or delete)
    #[arg(long)]
    pub action: Option<Action>,

    /// Parameter source; defaults to pipeline inputs, or env when NODE_ENV=dev
    #[arg(long, value_enum)]
    pub source: Option<SourceArg>,

    /// Read parameters from a TOML, JSON or YAML file
    #[arg(long, value_name = "PATH")]
    pub params_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Resolve the parameter source against the `NODE_ENV` value
    pub fn source_kind(&self, node_env: Option<&str>) -> Result<SourceKind> {
        let explicit = match self.source {
            None => None,
            Some(SourceArg::Pipeline) => Some(SourceKind::Pipeline),
            Some(SourceArg::Env) => Some(SourceKind::Environment),
            Some(SourceArg::File) => {
                if self.params_file.is_none() {
                    return Err(BlobstageError::config(
                        "--source file requires --params-file",
                    ));
                }
                None
            }
        };

        Ok(SourceKind::resolve(
            explicit,
            self.params_file.clone(),
            node_env,
        ))
    }

    /// Load parameters and run the selected action
    pub async fn execute(self, host: &dyn TaskHost) -> Result<()> {
        let node_env = std::env::var("NODE_ENV").ok();
        let kind = self.source_kind(node_env.as_deref())?;
        info!("Reading parameters from {:?}", kind);

        let params = ParameterLoader::new(kind.open()?, kind.is_dev()).load(self.action)?;
        info!("Running action '{}'", params.action);

        let auth_provider = create_auth_provider(params.credentials.as_ref())?;
        let ops: Arc<dyn ResourceOperations> = Arc::new(AzureResourceOperations::new(
            auth_provider,
            params.subscription_id.clone(),
        )?);

        match params.action {
            Action::Create => execute_create(ops, &params, host).await.map(|_| ()),
            Action::Delete => execute_delete(ops, &params).await,
        }
    }
}

/// Provision, upload and publish the SAS token
pub async fn execute_create(
    ops: Arc<dyn ResourceOperations>,
    params: &TaskParameters,
    host: &dyn TaskHost,
) -> Result<UploadSummary> {
    let workflow = ProvisioningWorkflow::new(ops, ProvisionTarget::from(params));
    let provisioned = workflow.provision().await?;

    let uploader = AzureBlobUploader::new(
        &params.storage_account_name,
        &params.container_name,
        &provisioned.account_key,
    );

    stage_and_publish(&uploader, params, &provisioned.grant, host).await
}

/// Upload the directory, then hand the token and URL to the host
pub async fn stage_and_publish(
    uploader: &dyn BlobUploader,
    params: &TaskParameters,
    grant: &SasGrant,
    host: &dyn TaskHost,
) -> Result<UploadSummary> {
    info!("SAS token: {}", grant.token);
    info!("SAS URL: {}", grant.url);

    let summary = upload_directory(
        uploader,
        &params.upload_directory,
        params.max_concurrent_uploads,
    )
    .await?;

    if let Some(name) = &params.output_variable {
        publish_sas(host, name, grant)?;
    }

    Ok(summary)
}

/// Remove the resource group and everything in it
pub async fn execute_delete(ops: Arc<dyn ResourceOperations>, params: &TaskParameters) -> Result<()> {
    let workflow = TeardownWorkflow::new(ops, params.resource_group_name.clone());
    workflow.teardown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_all_flags() {
        let cli = Cli::try_parse_from([
            "blobstage",
            "--action",
            "delete",
            "--source",
            "env",
            "--debug",
        ])
        .unwrap();
        assert_eq!(cli.action, Some(Action::Delete));
        assert_eq!(cli.source, Some(SourceArg::Env));
        assert!(cli.debug);
    }

    #[test]
    fn test_cli_rejects_unknown_action() {
        assert!(Cli::try_parse_from(["blobstage", "--action", "rebuild"]).is_err());
    }

    #[test]
    fn test_params_file_selects_file_source() {
        let cli = Cli::try_parse_from(["blobstage", "--params-file", "task.toml"]).unwrap();
        assert_eq!(
            cli.source_kind(Some("dev")).unwrap(),
            SourceKind::File(PathBuf::from("task.toml"))
        );
    }

    #[test]
    fn test_file_source_without_path_is_an_error() {
        let cli = Cli::try_parse_from(["blobstage", "--source", "file"]).unwrap();
        assert!(cli.source_kind(None).is_err());
    }

    #[test]
    fn test_default_source_follows_node_env() {
        let cli = Cli::try_parse_from(["blobstage"]).unwrap();
        assert_eq!(cli.source_kind(None).unwrap(), SourceKind::Pipeline);
        assert_eq!(cli.source_kind(Some("DEV")).unwrap(), SourceKind::Environment);

        let explicit = Cli::try_parse_from(["blobstage", "--source", "pipeline"]).unwrap();
        assert_eq!(explicit.source_kind(Some("dev")).unwrap(), SourceKind::Pipeline);
    }
}
