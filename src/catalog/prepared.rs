//! Catalog bound to one store handle

use std::collections::HashMap;

use super::errors::{QueryError, QueryResult};
use super::{QueryCatalog, QueryDescriptor};
use crate::observability::{log_event_at, Event, Severity};
use crate::store::{QueryParam, ResultRowSet, StoreConnection, StoreResult};

struct PreparedStatement<S> {
    statement: S,
    arity: usize,
}

/// Every catalog statement prepared against a single connection
///
/// The catalog owns its connection, so the two are always replaced
/// together. A `PreparedCatalog` is never partial: [`PreparedCatalog::prepare`]
/// either registers the whole catalog or closes the connection.
pub struct PreparedCatalog<C: StoreConnection> {
    connection: C,
    statements: HashMap<String, PreparedStatement<C::Statement>>,
}

impl<C: StoreConnection> PreparedCatalog<C> {
    /// Prepare the whole catalog on `connection`
    pub async fn prepare(connection: C, catalog: &QueryCatalog) -> QueryResult<Self> {
        let mut prepared = Self {
            connection,
            statements: HashMap::with_capacity(catalog.len()),
        };

        for descriptor in catalog.descriptors() {
            if let Err(err) = prepared.register(descriptor).await {
                if let Err(close_err) = prepared.close().await {
                    log_event_at(
                        Severity::Warn,
                        Event::StoreCloseFailed,
                        &[("reason", &close_err.to_string())],
                    );
                }
                return Err(err);
            }
        }

        Ok(prepared)
    }

    /// Prepare one statement on the owned connection
    pub async fn register(&mut self, descriptor: &QueryDescriptor) -> QueryResult<()> {
        let statement = self
            .connection
            .prepare(descriptor.name(), descriptor.sql())
            .await?;

        self.statements.insert(
            descriptor.name().to_string(),
            PreparedStatement {
                statement,
                arity: descriptor.param_arity(),
            },
        );
        Ok(())
    }

    /// Run a registered statement
    ///
    /// Name and arity are checked before the store is touched.
    pub async fn execute(&self, name: &str, params: &[QueryParam]) -> QueryResult<ResultRowSet> {
        let prepared = self
            .statements
            .get(name)
            .ok_or_else(|| QueryError::NotFound(name.to_string()))?;

        if params.len() != prepared.arity {
            return Err(QueryError::ArityMismatch {
                name: name.to_string(),
                expected: prepared.arity,
                actual: params.len(),
            });
        }

        let rows = self.connection.query(&prepared.statement, params).await?;
        Ok(rows)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.statements.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Release the statements and close the connection
    pub async fn close(self) -> StoreResult<()> {
        drop(self.statements);
        self.connection.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::names;
    use crate::store::{
        Cell, MemoryConnection, MemoryConnector, ResultRow, StoreConnector, StoreError,
    };

    async fn content_on(connector: &MemoryConnector) -> PreparedCatalog<MemoryConnection> {
        let conn = connector.connect("host=memory").await.unwrap();
        PreparedCatalog::prepare(conn, &QueryCatalog::content())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_prepare_registers_every_statement() {
        let connector = MemoryConnector::new();
        let catalog = content_on(&connector).await;

        assert_eq!(catalog.len(), 9);
        assert!(catalog.contains(names::IMAGE_BY_FILENAME));
        assert_eq!(connector.prepared_on(1), 9);
    }

    #[tokio::test]
    async fn test_prepare_failure_closes_connection() {
        let connector = MemoryConnector::new();
        connector.fail_prepare(names::RECENT_POSTS);
        let conn = connector.connect("host=memory").await.unwrap();

        let result = PreparedCatalog::prepare(conn, &QueryCatalog::content()).await;
        assert!(matches!(
            result,
            Err(QueryError::Store(StoreError::Prepare { .. }))
        ));
        assert_eq!(connector.closed(), vec![1]);
    }

    #[tokio::test]
    async fn test_execute_returns_fixture_rows() {
        let rows = ResultRowSet::new(vec![ResultRow::new(vec![Cell::integer("post_id", 7)])]);
        let connector = MemoryConnector::new().with_fixture(names::POST_BY_ID, rows.clone());
        let catalog = content_on(&connector).await;

        let result = catalog
            .execute(names::POST_BY_ID, &[QueryParam::Int(7)])
            .await
            .unwrap();
        assert_eq!(result, rows);
    }

    #[tokio::test]
    async fn test_unknown_name_does_not_touch_store() {
        let connector = MemoryConnector::new();
        let catalog = content_on(&connector).await;

        let err = catalog.execute("deletePost", &[]).await.unwrap_err();
        assert_eq!(err, QueryError::NotFound("deletePost".to_string()));
        assert!(connector.executions().is_empty());
    }

    #[tokio::test]
    async fn test_arity_checked_before_store() {
        let connector = MemoryConnector::new();
        let catalog = content_on(&connector).await;

        let err = catalog.execute(names::POST_BY_ID, &[]).await.unwrap_err();
        assert!(matches!(err, QueryError::ArityMismatch { expected: 1, actual: 0, .. }));

        let err = catalog
            .execute(names::ALL_POSTS, &[QueryParam::Int(1)])
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::ArityMismatch { expected: 0, actual: 1, .. }));
        assert!(connector.executions().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_surfaces_as_store_error() {
        let connector = MemoryConnector::new();
        let catalog = content_on(&connector).await;
        connector.break_connections();

        let err = catalog.execute(names::ALL_POSTS, &[]).await.unwrap_err();
        assert!(err.is_store_failure());
    }

    #[tokio::test]
    async fn test_close_closes_connection() {
        let connector = MemoryConnector::new();
        let catalog = content_on(&connector).await;
        catalog.close().await.unwrap();
        assert_eq!(connector.closed(), vec![1]);
    }
}
