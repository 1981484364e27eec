//! blobstage - Azure blob staging pipeline task
//!
//! Provisions a resource group, storage account and blob container,
//! uploads a local directory tree into the container and publishes a
//! read-only, time-bounded SAS URL. The delete action tears the resource
//! group down again.

pub mod auth;
pub mod blob;
pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod resources;
pub mod utils;

// Re-export commonly used types
pub use error::{BlobstageError, Result};
