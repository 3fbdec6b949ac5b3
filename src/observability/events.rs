//! Observable events
//!
//! Events are explicit and typed. Ad-hoc event names are still accepted by
//! [`Logger`](super::Logger) directly, but lifecycle transitions go through
//! this enum so their names stay stable.

use std::fmt;

/// Observable events in the content service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Boot & Lifecycle
    /// Startup begins
    StartupBegin,
    /// Configuration loaded and validated
    ConfigLoaded,
    /// Configuration reloaded from disk
    ConfigReloaded,
    /// Configuration re-read failed; the cached value stays in use
    ConfigReloadFailed,
    /// Full query catalog prepared against a store connection
    CatalogPrepared,
    /// Listener bound, accepting requests
    Serving,
    /// Serving without TLS
    TlsDisabled,
    /// Shutdown initiated
    ShutdownStart,
    /// Shutdown complete
    ShutdownComplete,

    // Requests
    /// Request answered successfully
    RequestComplete,
    /// No route matched the request
    RouteNotFound,
    /// Route matched but a parameter was rejected
    RequestRejected,
    /// Request answered with a server error
    RequestFailed,

    // Store
    /// Catalog query failed
    QueryFailed,
    /// Store driver task ended with an error
    StoreConnectionLost,
    /// Old store handle could not be closed cleanly
    StoreCloseFailed,
    /// Store could not be reopened; the service is unhealthy (FATAL)
    StoreUnrecoverable,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::StartupBegin => "RESTGRES_STARTUP_BEGIN",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::ConfigReloaded => "CONFIG_RELOADED",
            Event::ConfigReloadFailed => "CONFIG_RELOAD_FAILED",
            Event::CatalogPrepared => "CATALOG_PREPARED",
            Event::Serving => "RESTGRES_SERVING",
            Event::TlsDisabled => "TLS_DISABLED",
            Event::ShutdownStart => "SHUTDOWN_START",
            Event::ShutdownComplete => "SHUTDOWN_COMPLETE",

            Event::RequestComplete => "REQUEST_COMPLETE",
            Event::RouteNotFound => "ROUTE_NOT_FOUND",
            Event::RequestRejected => "REQUEST_REJECTED",
            Event::RequestFailed => "REQUEST_FAILED",

            Event::QueryFailed => "QUERY_FAILED",
            Event::StoreConnectionLost => "STORE_CONNECTION_LOST",
            Event::StoreCloseFailed => "STORE_CLOSE_FAILED",
            Event::StoreUnrecoverable => "STORE_UNRECOVERABLE",
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::StoreUnrecoverable)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
