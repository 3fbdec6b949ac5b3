//! # Content Store
//!
//! The relational store is reached through a [`StoreConnector`] that opens
//! [`StoreConnection`] handles. A handle is owned by exactly one prepared
//! catalog and is replaced wholesale, never repaired in place.
//!
//! - [`PgConnector`] talks to PostgreSQL through tokio-postgres
//! - [`MemoryConnector`] serves fixtures from memory and can inject faults

mod errors;
mod memory;
mod postgres;
mod row;

pub use errors::{StoreError, StoreResult};
pub use memory::{Execution, MemoryConnection, MemoryConnector, MemoryStatement};
pub use postgres::{PgConnection, PgConnector};
pub use row::{Cell, CellValue, QueryParam, ResultRow, ResultRowSet, SqlType};

use async_trait::async_trait;

/// An open handle to the store
#[async_trait]
pub trait StoreConnection: Send + Sync + 'static {
    /// Prepared statement handle
    type Statement: Send + Sync;

    /// Prepare a named, parameterized statement
    async fn prepare(&self, name: &str, sql: &str) -> StoreResult<Self::Statement>;

    /// Run a prepared statement with bound parameters
    async fn query(
        &self,
        statement: &Self::Statement,
        params: &[QueryParam],
    ) -> StoreResult<ResultRowSet>;

    /// Close the handle, releasing the underlying connection
    async fn close(self) -> StoreResult<()>;
}

/// Opens store handles from a connection string
#[async_trait]
pub trait StoreConnector: Send + Sync + 'static {
    type Connection: StoreConnection;

    async fn connect(&self, conn_string: &str) -> StoreResult<Self::Connection>;
}
