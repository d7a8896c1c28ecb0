//! Mock database clients for testing.
//!
//! Provide in-memory implementations so the batch pipeline and CLI paths
//! can run headless, without an Oracle instance.

use super::{ColumnInfo, Connector, DatabaseClient, QueryResult, Value};
use crate::error::{OrawatchError, Result};
use crate::resolver::ConnectionDescriptor;
use async_trait::async_trait;
use std::time::Duration;

/// A mock database client that returns a scripted result.
pub struct MockDatabaseClient {
    result: QueryResult,
}

impl MockDatabaseClient {
    /// Creates a mock that answers every statement with a one-row result.
    pub fn new() -> Self {
        Self {
            result: QueryResult::with_data(
                vec![ColumnInfo::new("RESULT", "VARCHAR2")],
                vec![vec![Value::String("ok".to_string())]],
            ),
        }
    }

    /// Creates a mock that answers every statement with the given result.
    pub fn with_result(result: QueryResult) -> Self {
        Self { result }
    }
}

impl Default for MockDatabaseClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn execute(&self, _sql: &str, _timeout: Duration) -> Result<QueryResult> {
        let mut result = self.result.clone();
        result.execution_time = Duration::from_millis(1);
        Ok(result)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// A mock client whose every execution fails with the given message.
pub struct FailingDatabaseClient {
    message: String,
}

impl FailingDatabaseClient {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl DatabaseClient for FailingDatabaseClient {
    async fn execute(&self, _sql: &str, _timeout: Duration) -> Result<QueryResult> {
        Err(OrawatchError::unexpected(self.message.clone()))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Connector handing out [`MockDatabaseClient`]s with a fixed result.
pub struct MockConnector {
    result: QueryResult,
}

impl MockConnector {
    pub fn new(result: QueryResult) -> Self {
        Self { result }
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _descriptor: &ConnectionDescriptor) -> Result<Box<dyn DatabaseClient>> {
        Ok(Box::new(MockDatabaseClient::with_result(self.result.clone())))
    }
}
