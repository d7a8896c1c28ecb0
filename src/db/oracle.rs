//! Oracle database client implementation.
//!
//! Wraps the synchronous `oracle` driver for use from async code: every
//! driver call runs inside `spawn_blocking`, a client-side deadline turns
//! overruns into the distinct `Timeout` error, and a server-side call
//! timeout is set on the connection so the database stops doing work the
//! client has given up on.

use crate::db::rewrite;
use crate::db::{ColumnInfo, DatabaseClient, QueryResult, Row, Value};
use crate::error::{DriverErrorKind, OrawatchError, Result};
use crate::resolver::ConnectionDescriptor;
use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Slack added to the client-side deadline so the server-side call timeout
/// gets a chance to produce its own, more precise error first.
const TIMEOUT_GRACE: Duration = Duration::from_secs(2);

/// Oracle database client.
pub struct OracleClient {
    conn: Arc<oracle::Connection>,
    max_rows: usize,
}

impl OracleClient {
    /// Opens a connection described by the resolved descriptor.
    pub async fn connect(descriptor: &ConnectionDescriptor, max_rows: usize) -> Result<Self> {
        let username = descriptor.username.clone();
        let password = descriptor.password.clone();
        let connect_string = descriptor.connect_string.clone();

        debug!("Connecting to {} as {}", connect_string, username);

        let conn = tokio::task::spawn_blocking(move || {
            oracle::Connection::connect(&username, &password, &connect_string)
        })
        .await
        .map_err(|e| OrawatchError::unexpected(format!("Connection task failed: {e}")))?
        .map_err(map_driver_error)?;

        apply_session_defaults(&conn);

        Ok(Self {
            conn: Arc::new(conn),
            max_rows,
        })
    }
}

#[async_trait]
impl DatabaseClient for OracleClient {
    async fn execute(&self, sql: &str, timeout: Duration) -> Result<QueryResult> {
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();
        let max_rows = self.max_rows;

        let handle = tokio::task::spawn_blocking(move || {
            // Server-side guard; the deadline below is authoritative.
            if let Err(e) = conn.set_call_timeout(Some(timeout)) {
                warn!("Failed to set call timeout: {e}");
            }
            run_blocking(&conn, &sql, max_rows)
        });

        match tokio::time::timeout(timeout + TIMEOUT_GRACE, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(OrawatchError::unexpected(format!(
                "Execution task failed: {join_err}"
            ))),
            Err(_) => {
                // The blocking task is still running; ask the server to
                // abort the call so the connection comes back usable.
                let _ = self.conn.break_execution();
                Err(OrawatchError::timeout(format!(
                    "Query exceeded {} seconds",
                    timeout.as_secs()
                )))
            }
        }
    }

    async fn close(&self) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || conn.close())
            .await
            .map_err(|e| OrawatchError::unexpected(format!("Close task failed: {e}")))?
            .map_err(map_driver_error)
    }
}

/// Session defaults applied right after connect, so DATE/TIMESTAMP columns
/// render uniformly across equipment databases.
fn apply_session_defaults(conn: &oracle::Connection) {
    let statements = [
        "ALTER SESSION SET NLS_TIMESTAMP_FORMAT = 'yyyy-mm-dd hh24:mi:ss'",
        "ALTER SESSION SET NLS_DATE_FORMAT = 'yyyy-mm-dd hh24:mi:ss'",
    ];

    for statement in statements {
        if let Err(e) = conn.execute(statement, &[]) {
            warn!("Failed to apply session setting `{statement}`: {e}");
        }
    }
}

/// Runs one statement synchronously. SELECT/WITH statements materialize a
/// row set (capped at `max_rows`); everything else reports affected rows.
fn run_blocking(conn: &oracle::Connection, sql: &str, max_rows: usize) -> Result<QueryResult> {
    let sql = sql.trim().trim_end_matches(';').trim();
    let start = Instant::now();

    if rewrite::is_query(sql) {
        run_select(conn, sql, max_rows, start)
    } else {
        run_statement(conn, sql, start)
    }
}

fn run_select(
    conn: &oracle::Connection,
    sql: &str,
    max_rows: usize,
    start: Instant,
) -> Result<QueryResult> {
    let result_set = conn.query(sql, &[]).map_err(map_driver_error)?;

    let raw_names: Vec<String> = result_set
        .column_info()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    let types: Vec<String> = result_set
        .column_info()
        .iter()
        .map(|c| format!("{:?}", c.oracle_type()))
        .collect();

    // Ad-hoc SELECTs routinely join tables that share column names; make
    // them unique so downstream lookups stay unambiguous.
    let columns: Vec<ColumnInfo> = rewrite::dedup_column_names(&raw_names)
        .into_iter()
        .zip(types)
        .map(|(name, data_type)| ColumnInfo::new(name, data_type))
        .collect();

    let mut rows: Vec<Row> = Vec::new();
    let mut was_truncated = false;

    for row_result in result_set {
        if rows.len() >= max_rows {
            was_truncated = true;
            break;
        }
        let row = row_result.map_err(map_driver_error)?;
        let mut cells: Vec<Value> = Vec::with_capacity(columns.len());
        for idx in 0..columns.len() {
            let value: Option<String> = row.get(idx).unwrap_or(None);
            cells.push(Value::from(value));
        }
        rows.push(cells);
    }

    if was_truncated {
        warn!("Query returned more than {max_rows} rows; result truncated");
    }

    let row_count = rows.len();
    Ok(QueryResult {
        columns,
        rows,
        execution_time: start.elapsed(),
        row_count,
        was_truncated,
    })
}

fn run_statement(conn: &oracle::Connection, sql: &str, start: Instant) -> Result<QueryResult> {
    let stmt = conn.execute(sql, &[]).map_err(map_driver_error)?;
    let affected = stmt.row_count().map_err(map_driver_error)?;

    Ok(QueryResult {
        columns: Vec::new(),
        rows: Vec::new(),
        execution_time: start.elapsed(),
        row_count: affected as usize,
        was_truncated: false,
    })
}

/// Maps a driver error into the orawatch taxonomy.
fn map_driver_error(err: oracle::Error) -> OrawatchError {
    classify_driver_text(&err.to_string())
}

/// Classifies a driver error message by its embedded ORA/DPI code.
///
/// Known codes get user-facing messages; everything else passes through
/// with the raw code and text. Cancellation and call-timeout codes surface
/// as the distinct `Timeout` error.
fn classify_driver_text(text: &str) -> OrawatchError {
    let ora_re = Regex::new(r"ORA-(\d{1,5})").expect("static regex");
    let dpi_re = Regex::new(r"DPI-(\d{1,4})").expect("static regex");

    if let Some(code) = ora_re
        .captures(text)
        .and_then(|c| c[1].parse::<i32>().ok())
    {
        let (kind, message) = match code {
            1017 => (
                DriverErrorKind::AuthFailure,
                "Invalid username or password".to_string(),
            ),
            12154 => (
                DriverErrorKind::NameResolution,
                "Connect identifier could not be resolved".to_string(),
            ),
            12514 => (
                DriverErrorKind::ServiceNotFound,
                "Listener does not know of the requested service".to_string(),
            ),
            12541 => (
                DriverErrorKind::ListenerUnreachable,
                "No listener at the target host/port".to_string(),
            ),
            1013 | 3136 => {
                return OrawatchError::timeout(format!("Execution cancelled: {text}"));
            }
            _ => (DriverErrorKind::Other, text.to_string()),
        };
        return OrawatchError::Driver {
            kind,
            code,
            message,
        };
    }

    if let Some(code) = dpi_re
        .captures(text)
        .and_then(|c| c[1].parse::<i32>().ok())
    {
        if code == 1067 {
            return OrawatchError::timeout(format!("Call timed out: {text}"));
        }
        return OrawatchError::Driver {
            kind: DriverErrorKind::Other,
            code,
            message: text.to_string(),
        };
    }

    OrawatchError::unexpected(format!("Connection or execution failed: {text}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_auth_failure() {
        let err =
            classify_driver_text("OCI Error: ORA-01017: invalid username/password; logon denied");
        match err {
            OrawatchError::Driver { kind, code, .. } => {
                assert_eq!(kind, DriverErrorKind::AuthFailure);
                assert_eq!(code, 1017);
            }
            other => panic!("Expected Driver error, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_name_resolution() {
        let err = classify_driver_text(
            "ORA-12154: TNS:could not resolve the connect identifier specified",
        );
        match err {
            OrawatchError::Driver { kind, .. } => {
                assert_eq!(kind, DriverErrorKind::NameResolution)
            }
            other => panic!("Expected Driver error, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_service_not_found() {
        let err = classify_driver_text(
            "ORA-12514: TNS:listener does not currently know of service requested",
        );
        match err {
            OrawatchError::Driver { kind, .. } => {
                assert_eq!(kind, DriverErrorKind::ServiceNotFound)
            }
            other => panic!("Expected Driver error, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_listener_unreachable() {
        let err = classify_driver_text("ORA-12541: TNS:no listener");
        match err {
            OrawatchError::Driver { kind, .. } => {
                assert_eq!(kind, DriverErrorKind::ListenerUnreachable)
            }
            other => panic!("Expected Driver error, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_other_passes_raw_code_and_message() {
        let err = classify_driver_text("ORA-00942: table or view does not exist");
        match &err {
            OrawatchError::Driver {
                kind,
                code,
                message,
            } => {
                assert_eq!(*kind, DriverErrorKind::Other);
                assert_eq!(*code, 942);
                assert!(message.contains("table or view does not exist"));
            }
            other => panic!("Expected Driver error, got {other:?}"),
        }
        assert!(err.to_string().contains("ORA-00942"));
    }

    #[test]
    fn test_classify_cancellation_is_timeout() {
        let err =
            classify_driver_text("ORA-01013: user requested cancel of current operation");
        assert_eq!(err.category(), "Timeout");
    }

    #[test]
    fn test_classify_call_timeout_is_timeout() {
        let err = classify_driver_text("DPI-1067: call timed out");
        assert_eq!(err.category(), "Timeout");
    }

    #[test]
    fn test_classify_non_driver_text_wraps_as_unexpected() {
        let err = classify_driver_text("connection reset by peer");
        assert_eq!(err.category(), "Unexpected Error");
        assert!(err.to_string().contains("Connection or execution failed"));
    }
}
