//! # Content Service
//!
//! The request-facing context: configuration, route table and store slot
//! in one value, shared by every request. Nothing here is global.

use std::sync::atomic::{AtomicBool, Ordering};

use axum::http::Method;
use tokio::sync::Notify;

use crate::catalog::QueryCatalog;
use crate::config::ConfigStore;
use crate::dispatch::{
    ApiResponse, DispatchError, DispatchResult, ResponseKind, RouteMatch, RouteTable,
};
use crate::marshal::{to_blob, to_json};
use crate::observability::{
    log_event_at, log_event_with_fields, Event, ObservationScope, Severity, Timer,
};
use crate::resilience::{ReconnectPolicy, ResiliencyError, ResiliencyPolicy};
use crate::store::{ResultRowSet, StoreConnector};

/// Serves the content API over one store
pub struct ContentService<K: StoreConnector> {
    config: ConfigStore,
    routes: RouteTable,
    store: ResiliencyPolicy<K>,
    unhealthy: AtomicBool,
    fatal: Notify,
}

impl<K: StoreConnector> ContentService<K> {
    /// Open the store with the configured connection string and prepare
    /// the content catalog
    pub async fn start(connector: K, config: ConfigStore) -> Result<Self, ResiliencyError> {
        let scope = ObservationScope::new("STORE_OPEN");
        let snapshot = config.snapshot();
        let opened = ResiliencyPolicy::open(
            connector,
            QueryCatalog::content(),
            ReconnectPolicy::from_config(&snapshot),
            &snapshot.db_conn_string,
        )
        .await;

        match opened {
            Ok(store) => {
                scope.complete();
                Ok(Self::new(config, RouteTable::content(), store))
            }
            Err(e) => {
                scope.fail(&e.to_string());
                Err(e)
            }
        }
    }

    pub fn new(config: ConfigStore, routes: RouteTable, store: ResiliencyPolicy<K>) -> Self {
        Self {
            config,
            routes,
            store,
            unhealthy: AtomicBool::new(false),
            fatal: Notify::new(),
        }
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn store(&self) -> &ResiliencyPolicy<K> {
        &self.store
    }

    /// Answer one request
    ///
    /// Never fails: every outcome is a response. Unmatched paths and
    /// non-GET methods get the fixed 404.
    pub async fn dispatch(&self, method: &Method, path: &str) -> ApiResponse {
        let timer = Timer::new();

        let route = match self.routes.classify(method, path) {
            Ok(Some(route)) => route,
            Ok(None) => {
                log_event_with_fields(
                    Event::RouteNotFound,
                    &[("method", method.as_str()), ("path", path)],
                );
                return ApiResponse::not_found();
            }
            Err(e) => {
                log_event_at(
                    Severity::Warn,
                    Event::RequestRejected,
                    &[("path", path), ("reason", &e.to_string())],
                );
                return ApiResponse::from(&DispatchError::from(e));
            }
        };

        match self.serve(&route).await {
            Ok(response) => {
                log_event_with_fields(
                    Event::RequestComplete,
                    &[
                        ("path", path),
                        ("query", route.query),
                        ("bytes", &response.body().len().to_string()),
                        ("elapsed_ms", &timer.elapsed_ms()),
                    ],
                );
                response
            }
            Err(e) => {
                let response = ApiResponse::from(&e);
                log_event_at(
                    Severity::Error,
                    Event::RequestFailed,
                    &[
                        ("path", path),
                        ("query", route.query),
                        ("status", response.status().as_str()),
                        ("reason", &e.to_string()),
                    ],
                );
                response
            }
        }
    }

    async fn serve(&self, route: &RouteMatch) -> DispatchResult<ApiResponse> {
        let rows = self.run_query(route).await?;

        match route.kind {
            ResponseKind::Json => Ok(ApiResponse::json(&to_json(&rows)?)?),
            ResponseKind::BinaryBlob => Ok(ApiResponse::blob(to_blob(rows))),
        }
    }

    /// Execute the route's query, recovering the store on store failure
    ///
    /// The failed request is not retried; it fails once recovery is done.
    /// After an exhausted recovery, store failures are answered without
    /// another attempt.
    async fn run_query(&self, route: &RouteMatch) -> DispatchResult<ResultRowSet> {
        let mut slot = self.store.lock().await;

        match slot.execute(route.query, &route.params).await {
            Ok(rows) => Ok(rows),
            Err(e) if e.is_store_failure() => {
                log_event_at(
                    Severity::Error,
                    Event::QueryFailed,
                    &[("query", route.query), ("reason", &e.to_string())],
                );

                // already given up; the server is on its way down
                if !self.is_healthy() {
                    return Err(e.into());
                }

                if let Err(fatal) = self.store.recover(&mut slot, &self.config).await {
                    self.mark_unhealthy();
                    return Err(fatal.into());
                }
                Err(e.into())
            }
            Err(e) => {
                log_event_at(
                    Severity::Error,
                    Event::QueryFailed,
                    &[("query", route.query), ("reason", &e.to_string())],
                );
                Err(e.into())
            }
        }
    }

    fn mark_unhealthy(&self) {
        self.unhealthy.store(true, Ordering::SeqCst);
        self.fatal.notify_waiters();
    }

    pub fn is_healthy(&self) -> bool {
        !self.unhealthy.load(Ordering::SeqCst)
    }

    /// Resolves once the store is declared unrecoverable
    pub async fn wait_unhealthy(&self) {
        loop {
            let notified = self.fatal.notified();
            if !self.is_healthy() {
                return;
            }
            notified.await;
        }
    }
}
