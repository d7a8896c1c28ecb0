//! Query definition persistence.
//!
//! CRUD operations for stored query definitions. A definition bundles the
//! SQL text with its connection reference, the enabled/notify flags, and the
//! notification rules (row-count thresholds and column/value checks). The
//! execution engine only ever reads these rows; it never mutates them.

use crate::error::{OrawatchError, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;
use sqlx::FromRow;

/// A stored query definition.
///
/// Connection reference fields follow a priority order at resolution time:
/// `saved_connection_id` wins, then the inline host/port/service triple,
/// then `tns_alias`. Threshold fields are kept as raw text; blank or
/// non-numeric values are skipped at evaluation, never rejected at save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDefinition {
    pub id: i64,
    pub name: String,
    pub sql: String,
    pub saved_connection_id: Option<i64>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub service: Option<String>,
    pub tns_alias: Option<String>,
    pub username: Option<String>,
    #[serde(skip_serializing, default)]
    pub password: Option<String>,
    pub enabled: bool,
    pub notify: bool,
    pub count_at_least: Option<String>,
    pub count_equals: Option<String>,
    pub count_at_most: Option<String>,
    pub check_columns: Option<String>,
    pub check_values: Option<String>,
    pub sort_order: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl QueryDefinition {
    /// Creates a new definition with defaults: enabled, no notifications.
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            sql: sql.into(),
            saved_connection_id: None,
            host: None,
            port: None,
            service: None,
            tns_alias: None,
            username: None,
            password: None,
            enabled: true,
            notify: false,
            count_at_least: None,
            count_equals: None,
            count_at_most: None,
            check_columns: None,
            check_values: None,
            sort_order: 0,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }
}

/// Raw database row for a query definition.
#[derive(Debug, Clone, FromRow)]
struct QueryDefinitionRow {
    id: i64,
    name: String,
    sql: String,
    saved_connection_id: Option<i64>,
    host: Option<String>,
    port: Option<i64>,
    service: Option<String>,
    tns_alias: Option<String>,
    username: Option<String>,
    password: Option<String>,
    enabled: bool,
    notify: bool,
    count_at_least: Option<String>,
    count_equals: Option<String>,
    count_at_most: Option<String>,
    check_columns: Option<String>,
    check_values: Option<String>,
    sort_order: i64,
    created_at: String,
    updated_at: String,
}

impl From<QueryDefinitionRow> for QueryDefinition {
    fn from(row: QueryDefinitionRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            sql: row.sql,
            saved_connection_id: row.saved_connection_id,
            host: row.host,
            port: row.port.map(|p| p as u16),
            service: row.service,
            tns_alias: row.tns_alias,
            username: row.username,
            password: row.password,
            enabled: row.enabled,
            notify: row.notify,
            count_at_least: row.count_at_least,
            count_equals: row.count_equals,
            count_at_most: row.count_at_most,
            check_columns: row.check_columns,
            check_values: row.check_values,
            sort_order: row.sort_order,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_COLUMNS: &str = "id, name, sql, saved_connection_id, host, port, service, \
     tns_alias, username, password, enabled, notify, \
     count_at_least, count_equals, count_at_most, check_columns, check_values, \
     sort_order, created_at, updated_at";

/// Creates a new query definition, returning its id.
pub async fn create_query(pool: &SqlitePool, def: &QueryDefinition) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO query_defs (name, sql, saved_connection_id, host, port, service,
                                tns_alias, username, password, enabled, notify,
                                count_at_least, count_equals, count_at_most,
                                check_columns, check_values, sort_order)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&def.name)
    .bind(&def.sql)
    .bind(def.saved_connection_id)
    .bind(&def.host)
    .bind(def.port.map(|p| p as i64))
    .bind(&def.service)
    .bind(&def.tns_alias)
    .bind(&def.username)
    .bind(&def.password)
    .bind(def.enabled)
    .bind(def.notify)
    .bind(&def.count_at_least)
    .bind(&def.count_equals)
    .bind(&def.count_at_most)
    .bind(&def.check_columns)
    .bind(&def.check_values)
    .bind(def.sort_order)
    .execute(pool)
    .await
    .map_err(|e| OrawatchError::persistence(format!("Failed to create query definition: {e}")))?;

    Ok(result.last_insert_rowid())
}

/// Gets a query definition by id.
pub async fn get_query(pool: &SqlitePool, id: i64) -> Result<Option<QueryDefinition>> {
    let row: Option<QueryDefinitionRow> =
        sqlx::query_as(&format!("SELECT {SELECT_COLUMNS} FROM query_defs WHERE id = ?"))
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| {
                OrawatchError::persistence(format!("Failed to get query definition: {e}"))
            })?;

    Ok(row.map(QueryDefinition::from))
}

/// Lists all query definitions in run order.
pub async fn list_queries(pool: &SqlitePool) -> Result<Vec<QueryDefinition>> {
    let rows: Vec<QueryDefinitionRow> = sqlx::query_as(&format!(
        "SELECT {SELECT_COLUMNS} FROM query_defs ORDER BY sort_order, id"
    ))
    .fetch_all(pool)
    .await
    .map_err(|e| OrawatchError::persistence(format!("Failed to list query definitions: {e}")))?;

    Ok(rows.into_iter().map(QueryDefinition::from).collect())
}

/// Lists only enabled query definitions in run order.
///
/// This is the list a batch run consumes; the orchestrator assumes the
/// filtering already happened here.
pub async fn list_enabled(pool: &SqlitePool) -> Result<Vec<QueryDefinition>> {
    let rows: Vec<QueryDefinitionRow> = sqlx::query_as(&format!(
        "SELECT {SELECT_COLUMNS} FROM query_defs WHERE enabled = 1 ORDER BY sort_order, id"
    ))
    .fetch_all(pool)
    .await
    .map_err(|e| OrawatchError::persistence(format!("Failed to list query definitions: {e}")))?;

    Ok(rows.into_iter().map(QueryDefinition::from).collect())
}

/// Updates an existing query definition in place.
pub async fn update_query(pool: &SqlitePool, def: &QueryDefinition) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE query_defs
        SET name = ?, sql = ?, saved_connection_id = ?, host = ?, port = ?, service = ?,
            tns_alias = ?, username = ?, password = ?, enabled = ?, notify = ?,
            count_at_least = ?, count_equals = ?, count_at_most = ?,
            check_columns = ?, check_values = ?, sort_order = ?,
            updated_at = datetime('now')
        WHERE id = ?
        "#,
    )
    .bind(&def.name)
    .bind(&def.sql)
    .bind(def.saved_connection_id)
    .bind(&def.host)
    .bind(def.port.map(|p| p as i64))
    .bind(&def.service)
    .bind(&def.tns_alias)
    .bind(&def.username)
    .bind(&def.password)
    .bind(def.enabled)
    .bind(def.notify)
    .bind(&def.count_at_least)
    .bind(&def.count_equals)
    .bind(&def.count_at_most)
    .bind(&def.check_columns)
    .bind(&def.check_values)
    .bind(def.sort_order)
    .bind(def.id)
    .execute(pool)
    .await
    .map_err(|e| OrawatchError::persistence(format!("Failed to update query definition: {e}")))?;

    if result.rows_affected() == 0 {
        return Err(OrawatchError::persistence(format!(
            "Query definition id {} not found",
            def.id
        )));
    }

    Ok(())
}

/// Enables or disables a query definition.
pub async fn set_enabled(pool: &SqlitePool, id: i64, enabled: bool) -> Result<()> {
    let result = sqlx::query(
        "UPDATE query_defs SET enabled = ?, updated_at = datetime('now') WHERE id = ?",
    )
    .bind(enabled)
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| OrawatchError::persistence(format!("Failed to update query definition: {e}")))?;

    if result.rows_affected() == 0 {
        return Err(OrawatchError::persistence(format!(
            "Query definition id {} not found",
            id
        )));
    }

    Ok(())
}

/// Deletes a query definition.
pub async fn delete_query(pool: &SqlitePool, id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM query_defs WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| {
            OrawatchError::persistence(format!("Failed to delete query definition: {e}"))
        })?;

    if result.rows_affected() == 0 {
        return Err(OrawatchError::persistence(format!(
            "Query definition id {} not found",
            id
        )));
    }

    Ok(())
}
