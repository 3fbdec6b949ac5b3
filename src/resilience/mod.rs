//! # Connection Resiliency
//!
//! Owns the store handle and its prepared catalog, and replaces both when
//! the store fails mid-request.
//!
//! ```text
//!            store failure
//! Connected ──────────────> Reconnecting
//!     ^                          │ close old handle
//!     │                          │ re-read connection string
//!     │                          │ open + prepare (bounded retry)
//!     └──────────────────────────┘
//! ```
//!
//! The slot sits behind an async mutex, so a request and a recovery never
//! interleave. A request that triggered recovery is answered only after
//! the slot is back in `Connected` (or recovery gave up).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

use crate::catalog::{PreparedCatalog, QueryCatalog, QueryError, QueryResult};
use crate::config::{ConfigStore, ServiceConfig};
use crate::observability::{
    log_event_at, log_event_with_fields, Event, Logger, ObservationScope, Severity,
};
use crate::store::{QueryParam, ResultRowSet, StoreConnection, StoreConnector};

/// Ceiling for the exponential backoff
pub const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Store handle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Reconnecting,
}

/// Resiliency errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResiliencyError {
    /// The initial handle could not be opened and prepared
    #[error("failed to open store: {0}")]
    Open(#[from] QueryError),

    /// Every reconnection attempt failed
    #[error("store unreachable after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: String },
}

/// Retry schedule for one recovery cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: MAX_BACKOFF,
        }
    }
}

impl ReconnectPolicy {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            max_attempts: config.reconnect_attempts.max(1),
            initial_backoff: Duration::from_millis(config.reconnect_backoff_ms),
            max_backoff: MAX_BACKOFF,
        }
    }

    /// Delay before attempt `attempt` (1-based); the first attempt is immediate
    pub fn backoff_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let doublings = (attempt - 2).min(31);
        self.initial_backoff
            .saturating_mul(1u32 << doublings)
            .min(self.max_backoff)
    }
}

/// The current store handle, its catalog and state
pub struct StoreSlot<C: StoreConnection> {
    state: ConnectionState,
    catalog: Option<PreparedCatalog<C>>,
}

impl<C: StoreConnection> StoreSlot<C> {
    fn connected(catalog: PreparedCatalog<C>) -> Self {
        Self {
            state: ConnectionState::Connected,
            catalog: Some(catalog),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn catalog(&self) -> Option<&PreparedCatalog<C>> {
        self.catalog.as_ref()
    }

    /// Run a catalog statement on the current handle
    pub async fn execute(&self, name: &str, params: &[QueryParam]) -> QueryResult<ResultRowSet> {
        match &self.catalog {
            Some(catalog) => catalog.execute(name, params).await,
            None => Err(QueryError::Disconnected),
        }
    }
}

/// Reconnect-on-failure policy over a single store slot
pub struct ResiliencyPolicy<K: StoreConnector> {
    connector: K,
    catalog: QueryCatalog,
    policy: ReconnectPolicy,
    slot: Mutex<StoreSlot<K::Connection>>,
    reconnects: AtomicU64,
}

impl<K: StoreConnector> ResiliencyPolicy<K> {
    /// Open the first handle
    ///
    /// A single attempt: a store that is down at startup aborts startup.
    pub async fn open(
        connector: K,
        catalog: QueryCatalog,
        policy: ReconnectPolicy,
        conn_string: &str,
    ) -> Result<Self, ResiliencyError> {
        let prepared = connect_prepared(&connector, &catalog, conn_string).await?;

        Ok(Self {
            connector,
            catalog,
            policy,
            slot: Mutex::new(StoreSlot::connected(prepared)),
            reconnects: AtomicU64::new(0),
        })
    }

    /// Exclusive access to the slot
    pub async fn lock(&self) -> MutexGuard<'_, StoreSlot<K::Connection>> {
        self.slot.lock().await
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    pub fn connector(&self) -> &K {
        &self.connector
    }

    /// Completed recovery cycles
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    /// Replace the slot's handle
    ///
    /// Order is fixed: mark `Reconnecting`, close the old handle, re-read
    /// the connection string, open and prepare a new handle, mark
    /// `Connected`. On exhaustion the slot is left `Reconnecting` with no
    /// catalog.
    pub async fn recover(
        &self,
        slot: &mut StoreSlot<K::Connection>,
        config: &ConfigStore,
    ) -> Result<(), ResiliencyError> {
        let scope = ObservationScope::new("STORE_RECONNECT");
        slot.state = ConnectionState::Reconnecting;

        if let Some(old) = slot.catalog.take() {
            if let Err(e) = old.close().await {
                log_event_at(
                    Severity::Warn,
                    Event::StoreCloseFailed,
                    &[("reason", &e.to_string())],
                );
            }
        }

        let conn_string = config.connection_string();
        let mut last = String::new();

        for attempt in 1..=self.policy.max_attempts {
            let delay = self.policy.backoff_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match connect_prepared(&self.connector, &self.catalog, &conn_string).await {
                Ok(prepared) => {
                    slot.catalog = Some(prepared);
                    slot.state = ConnectionState::Connected;
                    self.reconnects.fetch_add(1, Ordering::Relaxed);
                    scope.complete_with_fields(&[("attempts", &attempt.to_string())]);
                    return Ok(());
                }
                Err(e) => {
                    last = e.to_string();
                    Logger::warn(
                        "STORE_RECONNECT_ATTEMPT_FAILED",
                        &[("attempt", &attempt.to_string()), ("reason", &last)],
                    );
                }
            }
        }

        scope.fail(&last);
        let attempts = self.policy.max_attempts;
        log_event_with_fields(
            Event::StoreUnrecoverable,
            &[("attempts", &attempts.to_string()), ("reason", &last)],
        );
        Err(ResiliencyError::Exhausted { attempts, last })
    }
}

async fn connect_prepared<K: StoreConnector>(
    connector: &K,
    catalog: &QueryCatalog,
    conn_string: &str,
) -> QueryResult<PreparedCatalog<K::Connection>> {
    let connection = connector.connect(conn_string).await?;
    let prepared = PreparedCatalog::prepare(connection, catalog).await?;

    log_event_with_fields(
        Event::CatalogPrepared,
        &[("statements", &prepared.len().to_string())],
    );
    Ok(prepared)
}
