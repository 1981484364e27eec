//! Data models for blob uploads

use serde::Serialize;
use std::path::PathBuf;

/// A local file scheduled for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadItem {
    pub path: PathBuf,
    /// Object key: the path relative to the upload root, `/`-separated
    pub blob_name: String,
}

/// Totals for a completed directory upload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UploadSummary {
    pub files: usize,
    pub bytes: u64,
}

impl UploadSummary {
    pub fn record(&mut self, bytes: u64) {
        self.files += 1;
        self.bytes += bytes;
    }
}

/// Format a byte count for log output
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
