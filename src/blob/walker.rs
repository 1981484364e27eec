//! Directory upload
//!
//! Enumerates every file under an upload root and transfers each one into
//! the container, keyed by its path relative to the root.

use futures::{stream, StreamExt, TryStreamExt};
use std::path::{Component, Path};
use tracing::{debug, info};
use walkdir::WalkDir;

use super::manager::BlobUploader;
use super::models::{format_size, UploadItem, UploadSummary};
use crate::error::{BlobstageError, Result};

/// Object key for `path` relative to `root`, using `/` as the separator.
///
/// Stripping is done per path component, so `/data` never matches the
/// prefix of `/data2/file` and a trailing separator on `root` is ignored.
/// Components that are not valid UTF-8 are rejected rather than rewritten.
pub fn blob_name_for(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        BlobstageError::enumeration_failed(
            root.display().to_string(),
            format!("'{}' is not inside the upload directory", path.display()),
        )
    })?;

    let mut parts = Vec::new();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            let part = part.to_str().ok_or_else(|| {
                BlobstageError::enumeration_failed(
                    root.display().to_string(),
                    format!("'{}' is not a valid UTF-8 blob name", path.display()),
                )
            })?;
            parts.push(part);
        }
    }

    if parts.is_empty() {
        return Err(BlobstageError::enumeration_failed(
            root.display().to_string(),
            format!("'{}' does not name a file below the upload directory", path.display()),
        ));
    }

    Ok(parts.join("/"))
}

/// Every regular file below `root`, sorted by path.
///
/// Symlinked files are included; symlinked directories are not descended into.
pub fn enumerate_files(root: &Path) -> Result<Vec<UploadItem>> {
    let root_text = root.display().to_string();

    if !root.is_dir() {
        return Err(BlobstageError::enumeration_failed(
            root_text,
            "not a directory or not accessible",
        ));
    }

    let mut items = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
        let entry =
            entry.map_err(|e| BlobstageError::enumeration_failed(root_text.clone(), e.to_string()))?;

        let is_file = entry.file_type().is_file()
            || (entry.path_is_symlink() && entry.path().is_file());
        if !is_file {
            continue;
        }

        let blob_name = blob_name_for(root, entry.path())?;
        items.push(UploadItem {
            path: entry.into_path(),
            blob_name,
        });
    }

    items.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(items)
}

/// Upload every file under `root`, at most `concurrency` at a time.
///
/// Completes once all files are transferred; the first failure aborts the
/// remaining transfers and is returned.
pub async fn upload_directory(
    uploader: &dyn BlobUploader,
    root: &Path,
    concurrency: usize,
) -> Result<UploadSummary> {
    let items = enumerate_files(root)?;
    info!(
        "Uploading {} file(s) from '{}'",
        items.len(),
        root.display()
    );

    let summary = stream::iter(items)
        .map(|item| async move {
            let content = tokio::fs::read(&item.path)
                .await
                .map_err(|e| BlobstageError::upload_failed(item.blob_name.as_str(), e.to_string()))?;
            let size = content.len() as u64;

            debug!("Uploading '{}' as '{}'", item.path.display(), item.blob_name);
            uploader.upload_blob(&item.blob_name, content).await?;
            Ok::<u64, BlobstageError>(size)
        })
        .buffer_unordered(concurrency.max(1))
        .try_fold(UploadSummary::default(), |mut summary, size| async move {
            summary.record(size);
            Ok::<_, BlobstageError>(summary)
        })
        .await?;

    info!(
        "Uploaded {} file(s), {}",
        summary.files,
        format_size(summary.bytes)
    );
    Ok(summary)
}
