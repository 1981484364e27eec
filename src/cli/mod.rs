//! CLI module for blobstage
//!
//! This module contains the command-line interface: argument parsing and
//! execution of the create and delete actions.

pub mod commands;

pub use commands::*;
