//! Authentication module for Azure services
//!
//! This module provides authentication for Azure Resource Manager calls
//! using either a connected service principal or DefaultAzureCredential.

pub mod provider;

pub use provider::*;
