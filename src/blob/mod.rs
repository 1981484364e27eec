//! Azure Blob Storage uploads
//!
//! This module transfers a local directory tree into the provisioned
//! container, one block blob per file.

pub mod manager;
pub mod models;
pub mod walker;

// Re-export commonly used types
pub use manager::{AzureBlobUploader, BlobUploader};
pub use models::*;
pub use walker::{blob_name_for, enumerate_files, upload_directory};
