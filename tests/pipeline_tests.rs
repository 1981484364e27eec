//! Integration tests for the create action's upload and publish stage

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{TimeZone, Utc};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use tempfile::TempDir;

use blobstage::blob::BlobUploader;
use blobstage::cli::stage_and_publish;
use blobstage::config::{Action, TaskParameters};
use blobstage::pipeline::{escape_data, publish_sas, AgentCommandWriter, TaskHost, TaskResult};
use blobstage::resources::{SasGrant, SasPolicy, StorageAccountKey};
use blobstage::{BlobstageError, Result};

/// Keeps every uploaded blob in memory
#[derive(Default)]
struct RecordingUploader {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
    reject: Option<String>,
}

#[async_trait]
impl BlobUploader for RecordingUploader {
    async fn upload_blob(&self, name: &str, content: Vec<u8>) -> Result<()> {
        if self.reject.as_deref() == Some(name) {
            return Err(BlobstageError::upload_failed(name, "HTTP 500: Server busy"));
        }
        self.blobs.lock().unwrap().insert(name.to_string(), content);
        Ok(())
    }
}

/// Keeps every variable and result reported to the host
#[derive(Default)]
struct RecordingHost {
    variables: Mutex<Vec<(String, String)>>,
    results: Mutex<Vec<(TaskResult, String)>>,
}

impl TaskHost for RecordingHost {
    fn set_variable(&self, name: &str, value: &str) -> Result<()> {
        self.variables
            .lock()
            .unwrap()
            .push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn set_result(&self, result: TaskResult, message: &str) -> Result<()> {
        self.results
            .lock()
            .unwrap()
            .push((result, message.to_string()));
        Ok(())
    }
}

async fn grant() -> SasGrant {
    let now = Utc.with_ymd_and_hms(2024, 5, 20, 10, 0, 0).unwrap();
    let policy = SasPolicy::read_only(now, 5, 60).unwrap();
    let key = StorageAccountKey::new("key1", &BASE64.encode(b"pipeline-test-key"));
    SasGrant::issue(policy, "stdrop", "site", &key).await.unwrap()
}

fn params(root: &Path, output_variable: Option<&str>) -> TaskParameters {
    TaskParameters {
        action: Action::Create,
        subscription_id: "sub-1".to_string(),
        resource_group_name: "rg-drop".to_string(),
        location: "northeurope".to_string(),
        credentials: None,
        storage_account_name: "stdrop".to_string(),
        storage_account_type: "Standard_LRS".to_string(),
        container_name: "site".to_string(),
        upload_directory: root.to_path_buf(),
        sas_start_skew_minutes: 5,
        sas_expiry_minutes: 60,
        output_variable: output_variable.map(str::to_string),
        max_concurrent_uploads: 3,
        is_dev: true,
    }
}

fn create_site(base: &Path) {
    fs::create_dir_all(base.join("assets/img")).unwrap();
    fs::write(base.join("index.html"), "<h1>drop</h1>").unwrap();
    fs::write(base.join("assets/app.js"), "console.log(1);").unwrap();
    fs::write(base.join("assets/img/logo.bin"), [0u8, 159, 146, 150, 255]).unwrap();
}

#[tokio::test]
async fn test_stage_uploads_tree_and_publishes_both_variables() {
    let temp = TempDir::new().unwrap();
    create_site(temp.path());

    let uploader = RecordingUploader::default();
    let host = RecordingHost::default();
    let grant = grant().await;

    let summary = stage_and_publish(&uploader, &params(temp.path(), Some("dropSas")), &grant, &host)
        .await
        .unwrap();
    assert_eq!(summary.files, 3);

    let blobs = uploader.blobs.lock().unwrap();
    let names: Vec<&str> = blobs.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["assets/app.js", "assets/img/logo.bin", "index.html"]);
    assert_eq!(blobs["assets/img/logo.bin"], vec![0u8, 159, 146, 150, 255]);

    let variables = host.variables.lock().unwrap();
    assert_eq!(
        *variables,
        vec![
            ("dropSas".to_string(), grant.token.clone()),
            ("dropSas_URL".to_string(), grant.url.clone()),
        ]
    );
}

#[tokio::test]
async fn test_stage_without_output_variable_publishes_nothing() {
    let temp = TempDir::new().unwrap();
    create_site(temp.path());

    let uploader = RecordingUploader::default();
    let host = RecordingHost::default();

    stage_and_publish(&uploader, &params(temp.path(), None), &grant().await, &host)
        .await
        .unwrap();
    assert!(host.variables.lock().unwrap().is_empty());
    assert_eq!(uploader.blobs.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_failed_transfer_fails_stage_and_publishes_nothing() {
    let temp = TempDir::new().unwrap();
    create_site(temp.path());

    let uploader = RecordingUploader {
        reject: Some("assets/app.js".to_string()),
        ..RecordingUploader::default()
    };
    let host = RecordingHost::default();

    let err = stage_and_publish(&uploader, &params(temp.path(), Some("dropSas")), &grant().await, &host)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("assets/app.js"));
    assert!(host.variables.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_upload_directory_fails_stage() {
    let temp = TempDir::new().unwrap();
    let uploader = RecordingUploader::default();
    let host = RecordingHost::default();

    let err = stage_and_publish(
        &uploader,
        &params(&temp.path().join("missing"), None),
        &grant().await,
        &host,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, BlobstageError::EnumerationFailed { .. }));
}

#[tokio::test]
async fn test_agent_commands_for_published_grant() {
    let grant = grant().await;
    let writer = AgentCommandWriter::new(Vec::new());

    publish_sas(&writer, "dropSas", &grant).unwrap();
    writer
        .set_result(TaskResult::Succeeded, "Task completed")
        .unwrap();

    let text = String::from_utf8(writer.into_inner()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    // Percent-encoded token text is escaped for the agent
    assert!(lines[0].contains("%AZP25"));
    assert_eq!(
        lines[0],
        format!(
            "##vso[task.setvariable variable=dropSas;]{}",
            escape_data(&grant.token)
        )
    );
    assert_eq!(
        lines[1],
        format!(
            "##vso[task.setvariable variable=dropSas_URL;]{}",
            escape_data(&grant.url)
        )
    );
    assert_eq!(lines[2], "##vso[task.complete result=Succeeded;]Task completed");
}
