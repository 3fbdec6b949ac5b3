//! CLI module for Restgres
//!
//! Provides command-line interface for:
//! - serve: Open the store and serve the content API
//! - init: Write a configuration file
//! - check-config: Validate a configuration file

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, InitArgs};
pub use commands::{check_config, init, init_with, run, run_command, serve};
pub use errors::{CliError, CliErrorCode, CliResult};
