//! Pipeline host integration
//!
//! Reports output variables and the final task result back to the agent
//! that launched the task.

pub mod host;

pub use host::*;
