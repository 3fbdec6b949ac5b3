//! CLI argument definitions using clap
//!
//! Commands:
//! - restgres serve --config <path> [--insecure]
//! - restgres init --config <path> [--db-conn-string ..] [--cert-path ..] [--key-path ..] [--force]
//! - restgres check-config --config <path>

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_PATH;

/// Restgres - a read-only JSON content API over PostgreSQL
#[derive(Parser, Debug)]
#[command(name = "restgres")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the content API
    Serve {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Serve plain HTTP instead of TLS
        #[arg(long)]
        insecure: bool,
    },

    /// Write a configuration file, prompting for missing values
    Init(InitArgs),

    /// Load and validate a configuration file
    CheckConfig {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
}

/// Values for `restgres init`
#[derive(Args, Debug, Clone, Default)]
pub struct InitArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// PostgreSQL connection string
    #[arg(long)]
    pub db_conn_string: Option<String>,

    /// PEM certificate chain
    #[arg(long)]
    pub cert_path: Option<String>,

    /// PEM private key
    #[arg(long)]
    pub key_path: Option<String>,

    /// Overwrite an existing configuration file
    #[arg(long)]
    pub force: bool,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["restgres", "serve"]).unwrap();
        match cli.command {
            Command::Serve { config, insecure } => {
                assert_eq!(config, PathBuf::from(DEFAULT_CONFIG_PATH));
                assert!(!insecure);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_init_flags() {
        let cli = Cli::try_parse_from([
            "restgres",
            "init",
            "--config",
            "/tmp/r.json",
            "--db-conn-string",
            "host=db",
            "--force",
        ])
        .unwrap();
        match cli.command {
            Command::Init(args) => {
                assert_eq!(args.config, PathBuf::from("/tmp/r.json"));
                assert_eq!(args.db_conn_string.as_deref(), Some("host=db"));
                assert!(args.cert_path.is_none());
                assert!(args.force);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_check_config_short_flag() {
        let cli = Cli::try_parse_from(["restgres", "check-config", "-c", "x.json"]).unwrap();
        assert!(matches!(cli.command, Command::CheckConfig { .. }));
    }
}
