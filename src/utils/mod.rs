//! Utility functions module
//!
//! Duration-string parsing and HTTP client construction.

pub mod duration;
pub mod network;

pub use duration::*;
pub use network::*;
