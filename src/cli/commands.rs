//! CLI command implementations

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use serde_json::json;

use crate::config::{ConfigStore, ServiceConfig};
use crate::http_server::{HttpServer, HttpServerConfig, ServerError};
use crate::observability::{log_event_with_fields, Event};
use crate::service::ContentService;
use crate::store::PgConnector;

use super::args::{Command, InitArgs};
use super::errors::{CliError, CliResult};
use super::io::{prompt, write_response};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve { config, insecure } => serve(&config, insecure),
        Command::Init(args) => init(&args),
        Command::CheckConfig { config } => check_config(&config),
    }
}

/// Serve the content API until shutdown
///
/// Startup aborts if the configuration is invalid or the store cannot be
/// opened and prepared. The server runs on a single-threaded runtime.
pub fn serve(config_path: &Path, insecure: bool) -> CliResult<()> {
    log_event_with_fields(
        Event::StartupBegin,
        &[("config", &config_path.display().to_string())],
    );

    let store = ConfigStore::load(config_path, !insecure)?;
    let http_config = HttpServerConfig::from_service(&store.snapshot(), insecure);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(async {
        let service = ContentService::start(PgConnector, store)
            .await
            .map_err(|e| CliError::boot_failed(e.to_string()))?;

        HttpServer::new(http_config, Arc::new(service))
            .start()
            .await
            .map_err(|e| match e {
                ServerError::StoreUnrecoverable => CliError::store_unrecoverable(e.to_string()),
                other => CliError::boot_failed(format!("HTTP server failed: {}", other)),
            })
    })
}

/// Write a configuration file, prompting on stdin for missing values
pub fn init(args: &InitArgs) -> CliResult<()> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();

    let config = init_with(args, &mut input, &mut output)?;
    writeln!(output)?;
    write_response(json!({
        "config": args.config.display().to_string(),
        "tls": config.tls_paths().is_some(),
    }))
}

/// [`init`] over arbitrary input and output
pub fn init_with<R: BufRead, W: Write>(
    args: &InitArgs,
    input: &mut R,
    output: &mut W,
) -> CliResult<ServiceConfig> {
    if args.config.exists() && !args.force {
        return Err(CliError::config_exists(&args.config));
    }

    let db_conn_string = match &args.db_conn_string {
        Some(value) => value.clone(),
        None => prompt(
            input,
            output,
            "Please enter your PostgreSQL database connection string: ",
        )?,
    };
    let cert_path = match &args.cert_path {
        Some(value) => value.clone(),
        None => prompt(
            input,
            output,
            "Please enter the path to the TLS certificate (empty for none): ",
        )?,
    };
    let key_path = match &args.key_path {
        Some(value) => value.clone(),
        None => prompt(
            input,
            output,
            "Please enter the path to the TLS private key (empty for none): ",
        )?,
    };

    let config = ServiceConfig::new(db_conn_string, cert_path, key_path);
    config.validate(false)?;
    config.write(&args.config)?;

    Ok(config)
}

/// Load and validate a configuration file, printing a redacted summary
pub fn check_config(config_path: &Path) -> CliResult<()> {
    let config = ServiceConfig::read(config_path)?;
    config.validate(false)?;

    write_response(check_summary(config_path, &config))
}

fn check_summary(config_path: &Path, config: &ServiceConfig) -> serde_json::Value {
    json!({
        "config": config_path.display().to_string(),
        "dbConnString": config.redacted_conn_string(),
        "listen": format!("{}:{}", config.host, config.port),
        "tls": config.tls_paths().is_some(),
        "reconnectAttempts": config.reconnect_attempts,
        "reconnectBackoffMs": config.reconnect_backoff_ms,
    })
}
