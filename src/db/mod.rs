//! Database abstraction layer for orawatch.
//!
//! Provides a trait-based interface for query execution so the batch
//! orchestrator can run against the real Oracle driver or an in-memory
//! double interchangeably.

mod mock;
mod oracle;
pub mod rewrite;
mod types;

pub use mock::{FailingDatabaseClient, MockConnector, MockDatabaseClient};
pub use self::oracle::OracleClient;
pub use types::{ColumnInfo, QueryResult, Row, Value};

use crate::error::Result;
use crate::resolver::ConnectionDescriptor;
use async_trait::async_trait;
use std::time::Duration;

/// Trait defining the interface for database clients.
///
/// All operations are async and return Results with OrawatchError. The
/// timeout is a hard per-call deadline; exceeding it surfaces as a distinct
/// `Timeout` error rather than a generic failure.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Executes one SQL statement and returns the tabular result.
    async fn execute(&self, sql: &str, timeout: Duration) -> Result<QueryResult>;

    /// Closes the database connection.
    async fn close(&self) -> Result<()>;
}

/// Factory seam turning a resolved connection descriptor into a live client.
///
/// The orchestrator only ever talks to this trait, which is what lets the
/// batch pipeline run headless against mocks.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<Box<dyn DatabaseClient>>;
}

/// Connector producing real Oracle connections.
pub struct OracleConnector {
    /// Cap applied to SELECT results; rows past it are dropped and the
    /// result is marked truncated.
    pub max_rows: usize,
}

impl OracleConnector {
    pub fn new(max_rows: usize) -> Self {
        Self { max_rows }
    }
}

#[async_trait]
impl Connector for OracleConnector {
    async fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<Box<dyn DatabaseClient>> {
        let client = OracleClient::connect(descriptor, self.max_rows).await?;
        Ok(Box::new(client))
    }
}
