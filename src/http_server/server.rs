//! # HTTP Server
//!
//! Thin axum shell around [`ContentService`]. Every request goes to one
//! fallback handler; routing happens in the dispatcher.

use std::any::Any;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{Method, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;

use super::config::HttpServerConfig;
use crate::dispatch::ApiResponse;
use crate::observability::{log_event_at, log_event_with_fields, Event, Severity};
use crate::service::ContentService;
use crate::store::StoreConnector;

/// Grace period for in-flight TLS connections on shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Server shell errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid listen address {0}")]
    Address(String),

    #[error("failed to load TLS material: {0}")]
    Tls(io::Error),

    #[error(transparent)]
    Io(#[from] io::Error),

    /// Stopped because the store could not be reopened
    #[error("store unrecoverable, server stopped")]
    StoreUnrecoverable,
}

/// HTTP server for the content API
pub struct HttpServer<K: StoreConnector> {
    config: HttpServerConfig,
    service: Arc<ContentService<K>>,
}

impl<K: StoreConnector> HttpServer<K> {
    pub fn new(config: HttpServerConfig, service: Arc<ContentService<K>>) -> Self {
        Self { config, service }
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(&self) -> Router {
        build_router(Arc::clone(&self.service))
    }

    /// Serve until ctrl-c or until the store is declared unrecoverable
    ///
    /// Returns [`ServerError::StoreUnrecoverable`] in the second case so
    /// the process can exit non-zero.
    pub async fn start(self) -> Result<(), ServerError> {
        let addr: SocketAddr = self
            .config
            .socket_addr()
            .parse()
            .map_err(|_| ServerError::Address(self.config.socket_addr()))?;

        let router = self.router();
        let shutdown = shutdown_signal(Arc::clone(&self.service));
        let scheme = self.config.scheme();

        match &self.config.tls {
            Some(tls) => {
                let rustls = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
                    .await
                    .map_err(ServerError::Tls)?;

                let handle = axum_server::Handle::new();
                let shutdown_handle = handle.clone();
                tokio::spawn(async move {
                    shutdown.await;
                    shutdown_handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
                });

                log_serving(scheme, &addr);
                axum_server::bind_rustls(addr, rustls)
                    .handle(handle)
                    .serve(router.into_make_service())
                    .await?;
            }
            None => {
                log_event_at(Severity::Warn, Event::TlsDisabled, &[]);
                let listener = TcpListener::bind(addr).await?;

                log_serving(scheme, &addr);
                axum::serve(listener, router)
                    .with_graceful_shutdown(shutdown)
                    .await?;
            }
        }

        log_event_with_fields(
            Event::ShutdownComplete,
            &[("healthy", &self.service.is_healthy().to_string())],
        );

        if self.service.is_healthy() {
            Ok(())
        } else {
            Err(ServerError::StoreUnrecoverable)
        }
    }
}

/// Build the router: every method and path goes to the dispatcher
///
/// JSON responses carry their own `Access-Control-Allow-Origin`; there is
/// no preflight handling, so `OPTIONS` gets the same 404 as any non-GET.
pub fn build_router<K: StoreConnector>(service: Arc<ContentService<K>>) -> Router {
    Router::new()
        .fallback(handle_request::<K>)
        .with_state(service)
        .layer(CatchPanicLayer::custom(panic_response))
}

/// A panicking handler still answers with the fixed 500
fn panic_response(_err: Box<dyn Any + Send + 'static>) -> Response {
    log_event_at(
        Severity::Error,
        Event::RequestFailed,
        &[("reason", "handler panicked")],
    );
    ApiResponse::internal_error().into_response()
}

async fn handle_request<K: StoreConnector>(
    State(service): State<Arc<ContentService<K>>>,
    method: Method,
    uri: Uri,
) -> ApiResponse {
    service.dispatch(&method, uri.path()).await
}

async fn shutdown_signal<K: StoreConnector>(service: Arc<ContentService<K>>) {
    let reason = tokio::select! {
        Ok(()) = tokio::signal::ctrl_c() => "signal",
        _ = service.wait_unhealthy() => "store_unrecoverable",
    };

    log_event_with_fields(Event::ShutdownStart, &[("reason", reason)]);
}

fn log_serving(scheme: &str, addr: &SocketAddr) {
    log_event_with_fields(
        Event::Serving,
        &[("addr", &addr.to_string()), ("scheme", scheme)],
    );
}
