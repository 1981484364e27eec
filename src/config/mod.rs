//! Configuration management module
//!
//! This module handles parameter loading and validation from the pipeline
//! agent's input bindings, development-mode environment variables, or a
//! parameters file.

pub mod settings;
pub mod sources;

pub use settings::*;
pub use sources::*;
