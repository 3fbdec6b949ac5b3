//! In-memory store
//!
//! Serves fixture row sets keyed by statement name and keeps a ledger of
//! every handle opened or closed, statement prepared and query executed.
//! Faults can be injected to drive the recovery path without a database.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::errors::{StoreError, StoreResult};
use super::row::{QueryParam, ResultRowSet};
use super::{StoreConnection, StoreConnector};

/// One recorded query execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    /// Handle generation the query ran on (first handle is 1)
    pub generation: u64,
    pub statement: String,
    pub params: Vec<QueryParam>,
}

#[derive(Debug, Default)]
struct MemoryState {
    fixtures: HashMap<String, ResultRowSet>,
    generation: u64,
    broken_through: u64,
    refused_connects: u32,
    failing_prepare: Option<String>,
    connect_strings: Vec<String>,
    closed: Vec<u64>,
    prepared: Vec<(u64, String)>,
    executions: Vec<Execution>,
}

/// Connector over shared in-memory state
///
/// Clones share the same state, so a test can keep one clone to inspect
/// the ledger while the service owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`MemoryConnector::set_fixture`]
    pub fn with_fixture(self, statement: &str, rows: ResultRowSet) -> Self {
        self.set_fixture(statement, rows);
        self
    }

    /// Rows returned by every execution of `statement`
    ///
    /// Statements without a fixture return zero rows.
    pub fn set_fixture(&self, statement: &str, rows: ResultRowSet) {
        self.lock().fixtures.insert(statement.to_string(), rows);
    }

    /// Break every handle opened so far; handles opened later are healthy
    pub fn break_connections(&self) {
        let mut state = self.lock();
        state.broken_through = state.generation;
    }

    /// Refuse the next `count` connection attempts
    pub fn refuse_connects(&self, count: u32) {
        self.lock().refused_connects = count;
    }

    /// Reject preparation of `statement` on every handle
    pub fn fail_prepare(&self, statement: &str) {
        self.lock().failing_prepare = Some(statement.to_string());
    }

    /// Number of successful connections
    pub fn connects(&self) -> u64 {
        self.lock().generation
    }

    /// Connection strings of every attempt, refused ones included
    pub fn connect_strings(&self) -> Vec<String> {
        self.lock().connect_strings.clone()
    }

    /// Generations of the handles closed so far, in close order
    pub fn closed(&self) -> Vec<u64> {
        self.lock().closed.clone()
    }

    /// Number of statements prepared on handle `generation`
    pub fn prepared_on(&self, generation: u64) -> usize {
        self.lock()
            .prepared
            .iter()
            .filter(|(g, _)| *g == generation)
            .count()
    }

    /// Every execution attempt, failed ones included
    pub fn executions(&self) -> Vec<Execution> {
        self.lock().executions.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl StoreConnector for MemoryConnector {
    type Connection = MemoryConnection;

    async fn connect(&self, conn_string: &str) -> StoreResult<MemoryConnection> {
        let mut state = self.lock();
        state.connect_strings.push(conn_string.to_string());

        if state.refused_connects > 0 {
            state.refused_connects -= 1;
            return Err(StoreError::Connect("connection refused".to_string()));
        }

        state.generation += 1;
        Ok(MemoryConnection {
            state: Arc::clone(&self.state),
            generation: state.generation,
        })
    }
}

/// A handle onto the shared in-memory state
#[derive(Debug)]
pub struct MemoryConnection {
    state: Arc<Mutex<MemoryState>>,
    generation: u64,
}

impl MemoryConnection {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Statement prepared on a [`MemoryConnection`]
#[derive(Debug, Clone)]
pub struct MemoryStatement {
    name: String,
}

#[async_trait]
impl StoreConnection for MemoryConnection {
    type Statement = MemoryStatement;

    async fn prepare(&self, name: &str, _sql: &str) -> StoreResult<MemoryStatement> {
        let mut state = self.lock();
        if state.failing_prepare.as_deref() == Some(name) {
            return Err(StoreError::Prepare {
                name: name.to_string(),
                reason: "syntax error".to_string(),
            });
        }

        state.prepared.push((self.generation, name.to_string()));
        Ok(MemoryStatement {
            name: name.to_string(),
        })
    }

    async fn query(
        &self,
        statement: &MemoryStatement,
        params: &[QueryParam],
    ) -> StoreResult<ResultRowSet> {
        let mut state = self.lock();
        state.executions.push(Execution {
            generation: self.generation,
            statement: statement.name.clone(),
            params: params.to_vec(),
        });

        if state.closed.contains(&self.generation) {
            return Err(StoreError::Closed);
        }
        if self.generation <= state.broken_through {
            return Err(StoreError::Query(
                "server closed the connection unexpectedly".to_string(),
            ));
        }

        Ok(state
            .fixtures
            .get(&statement.name)
            .cloned()
            .unwrap_or_default())
    }

    async fn close(self) -> StoreResult<()> {
        let mut state = self.lock();
        state.closed.push(self.generation);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Cell, ResultRow};

    fn one_row() -> ResultRowSet {
        ResultRowSet::new(vec![ResultRow::new(vec![Cell::integer("post_id", 1)])])
    }

    #[tokio::test]
    async fn test_fixture_served_and_recorded() {
        let connector = MemoryConnector::new().with_fixture("allPosts", one_row());
        let conn = connector.connect("host=memory").await.unwrap();
        let stmt = conn.prepare("allPosts", "select 1").await.unwrap();

        let rows = conn.query(&stmt, &[]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(connector.executions().len(), 1);
        assert_eq!(connector.prepared_on(1), 1);
    }

    #[tokio::test]
    async fn test_missing_fixture_is_zero_rows() {
        let connector = MemoryConnector::new();
        let conn = connector.connect("host=memory").await.unwrap();
        let stmt = conn.prepare("postById", "select $1").await.unwrap();

        let rows = conn.query(&stmt, &[QueryParam::Int(9)]).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_break_only_affects_existing_handles() {
        let connector = MemoryConnector::new();
        let old = connector.connect("a").await.unwrap();
        let stmt = old.prepare("allPosts", "select 1").await.unwrap();
        connector.break_connections();

        assert!(old.query(&stmt, &[]).await.is_err());

        let fresh = connector.connect("a").await.unwrap();
        let stmt = fresh.prepare("allPosts", "select 1").await.unwrap();
        assert!(fresh.query(&stmt, &[]).await.is_ok());
        assert_eq!(fresh.generation(), 2);
    }

    #[tokio::test]
    async fn test_refused_connects_are_counted_down() {
        let connector = MemoryConnector::new();
        connector.refuse_connects(1);

        assert!(connector.connect("a").await.is_err());
        assert!(connector.connect("a").await.is_ok());
        assert_eq!(connector.connects(), 1);
        assert_eq!(connector.connect_strings().len(), 2);
    }
}
