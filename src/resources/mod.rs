//! Azure resource provisioning
//!
//! Management-plane operations, SAS issuance and the provisioning and
//! teardown workflows built on them.

pub mod models;
pub mod operations;
pub mod sas;
pub mod workflow;

pub use models::*;
pub use operations::{AzureResourceOperations, ResourceOperations};
pub use sas::{SasGrant, SasPolicy};
pub use workflow::{ProvisionReport, ProvisionTarget, Provisioned, ProvisioningWorkflow, TeardownWorkflow};
