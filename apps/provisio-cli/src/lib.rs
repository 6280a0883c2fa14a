//! provisio CLI library
//!
//! The binary in main.rs is a thin wrapper around [`cli::run`]; everything
//! else lives here so integration tests can drive the commands directly.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
