//! # Restgres HTTP Server Module
//!
//! The network shell: binds the listener (plain or rustls), forwards each
//! request's method and path to the content service and writes back the
//! response. Shuts down gracefully on ctrl-c or when the store is declared
//! unrecoverable.

pub mod config;
pub mod server;

pub use config::{HttpServerConfig, TlsConfig};
pub use server::{build_router, HttpServer, ServerError};
