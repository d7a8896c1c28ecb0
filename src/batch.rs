//! Batch orchestration.
//!
//! Runs an ordered list of query definitions strictly sequentially: resolve
//! the connection, execute, evaluate notifications, report to the sinks,
//! move on. A failure in any single item is recorded and the loop
//! continues; the batch itself always completes with a tally.

use crate::db::{Connector, DatabaseClient, QueryResult};
use crate::notify;
use crate::persistence::{QueryDefinition, SavedConnection};
use crate::resolver::{ConnectionDescriptor, Resolver};
use crate::tns::TnsTable;
use chrono::{DateTime, Local};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Per-query result of one batch item.
///
/// Created once per query per run, consumed by the sink and the log, then
/// discarded.
#[derive(Debug)]
pub struct ExecutionOutcome {
    pub success: bool,
    /// Tabular result on success, None on failure.
    pub result: Option<QueryResult>,
    /// Error message on failure, None on success.
    pub error: Option<String>,
    pub elapsed: Duration,
}

impl ExecutionOutcome {
    fn success(result: QueryResult, elapsed: Duration) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            elapsed,
        }
    }

    fn failure(message: String, elapsed: Duration) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(message),
            elapsed,
        }
    }
}

/// Aggregate of a full batch run.
#[derive(Debug)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    /// Notification strings in emission order.
    pub notifications: Vec<String>,
    /// One structured log line per executed item, in run order.
    pub log: Vec<String>,
    pub started_at: DateTime<Local>,
    pub total_elapsed: Duration,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Receives each query's outcome as it completes. The CLI renders results
/// through this seam; tests collect them.
pub trait ResultSink: Send {
    fn on_result(&mut self, def: &QueryDefinition, outcome: &ExecutionOutcome);
}

/// Sink that drops everything.
pub struct NullSink;

impl ResultSink for NullSink {
    fn on_result(&mut self, _def: &QueryDefinition, _outcome: &ExecutionOutcome) {}
}

/// Receives human-readable progress strings during a run.
pub trait ProgressReporter: Send {
    fn on_progress(&mut self, message: &str);
}

/// Reporter that drops everything.
pub struct NullProgress;

impl ProgressReporter for NullProgress {
    fn on_progress(&mut self, _message: &str) {}
}

/// Knobs for one batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Per-query execution deadline.
    pub query_timeout: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(300),
        }
    }
}

/// Drives a batch over read-only snapshots.
///
/// The saved-connection list and TNS table are taken once at construction;
/// refreshing them means building a new orchestrator between runs, never
/// swapping state during one.
pub struct BatchOrchestrator<'a> {
    connector: &'a dyn Connector,
    connections: Vec<SavedConnection>,
    tns: TnsTable,
    options: BatchOptions,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(
        connector: &'a dyn Connector,
        connections: Vec<SavedConnection>,
        tns: TnsTable,
        options: BatchOptions,
    ) -> Self {
        Self {
            connector,
            connections,
            tns,
            options,
        }
    }

    /// Runs the given definitions in list order.
    ///
    /// The caller has already filtered to enabled items. Each item's
    /// connection is opened and released within its own turn; no two items
    /// share execution state.
    pub async fn run(
        &self,
        defs: &[QueryDefinition],
        sink: &mut dyn ResultSink,
        progress: &mut dyn ProgressReporter,
    ) -> BatchSummary {
        let started_at = Local::now();
        let batch_start = Instant::now();
        let resolver = Resolver::new(&self.connections, &self.tns);

        let mut succeeded = 0usize;
        let mut failed = 0usize;
        let mut notifications: Vec<String> = Vec::new();
        let mut log: Vec<String> = Vec::new();

        for (index, def) in defs.iter().enumerate() {
            progress.on_progress(&format!(
                "Running query {} of {}: {}",
                index + 1,
                defs.len(),
                def.name
            ));

            let item_started = Local::now();
            let (outcome, descriptor) = self.run_one(&resolver, def).await;

            let item_notifications = match (&outcome.result, outcome.success) {
                (Some(result), true) => notify::evaluate(def, result),
                _ => Vec::new(),
            };

            if outcome.success {
                succeeded += 1;
                info!("Query '{}' succeeded in {:?}", def.name, outcome.elapsed);
            } else {
                failed += 1;
                warn!(
                    "Query '{}' failed: {}",
                    def.name,
                    outcome.error.as_deref().unwrap_or("unknown error")
                );
            }

            log.push(log_line(
                def,
                &outcome,
                descriptor.as_ref(),
                item_started,
                item_notifications.len(),
            ));
            notifications.extend(item_notifications);

            sink.on_result(def, &outcome);
        }

        BatchSummary {
            succeeded,
            failed,
            notifications,
            log,
            started_at,
            total_elapsed: batch_start.elapsed(),
        }
    }

    /// One item's pipeline: resolve, connect, execute, close. Every error
    /// is converted into a failure outcome here so the batch loop never
    /// sees a Result.
    async fn run_one(
        &self,
        resolver: &Resolver<'_>,
        def: &QueryDefinition,
    ) -> (ExecutionOutcome, Option<ConnectionDescriptor>) {
        let start = Instant::now();

        let descriptor = match resolver.resolve(def) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                return (
                    ExecutionOutcome::failure(e.to_string(), start.elapsed()),
                    None,
                );
            }
        };

        let client = match self.connector.connect(&descriptor).await {
            Ok(client) => client,
            Err(e) => {
                return (
                    ExecutionOutcome::failure(e.to_string(), start.elapsed()),
                    Some(descriptor),
                );
            }
        };

        let outcome = self.execute_and_close(client, def).await;
        (outcome, Some(descriptor))
    }

    async fn execute_and_close(
        &self,
        client: Box<dyn DatabaseClient>,
        def: &QueryDefinition,
    ) -> ExecutionOutcome {
        let start = Instant::now();
        let result = client.execute(&def.sql, self.options.query_timeout).await;

        // Release the connection before the next item starts, success or not.
        if let Err(e) = client.close().await {
            warn!("Failed to close connection for '{}': {e}", def.name);
        }

        match result {
            Ok(result) => ExecutionOutcome::success(result, start.elapsed()),
            Err(e) => ExecutionOutcome::failure(e.to_string(), start.elapsed()),
        }
    }
}

/// One structured log line per item: start time, resolved connection, user
/// id, completion time, duration, result shape, notification count, outcome.
fn log_line(
    def: &QueryDefinition,
    outcome: &ExecutionOutcome,
    descriptor: Option<&ConnectionDescriptor>,
    started: DateTime<Local>,
    notification_count: usize,
) -> String {
    let finished = Local::now();
    let connection = descriptor
        .map(|d| d.display_string())
        .unwrap_or_else(|| "unresolved".to_string());
    let user = descriptor.map(|d| d.username.as_str()).unwrap_or("-");
    let shape = outcome
        .result
        .as_ref()
        .map(|r| format!("{}x{}", r.row_count, r.columns.len()))
        .unwrap_or_else(|| "-".to_string());
    let status = if outcome.success {
        "OK".to_string()
    } else {
        format!(
            "FAILED: {}",
            outcome.error.as_deref().unwrap_or("unknown error")
        )
    };

    format!(
        "{} | {} | conn={} | user={} | finished {} | {:.3}s | rows/cols {} | {} notification(s) | {}",
        started.format("%Y-%m-%d %H:%M:%S"),
        def.name,
        connection,
        user,
        finished.format("%H:%M:%S"),
        outcome.elapsed.as_secs_f64(),
        shape,
        notification_count,
        status
    )
}
