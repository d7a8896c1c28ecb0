//! Saved connection persistence.
//!
//! CRUD operations for saved database connections. A saved connection
//! bundles credentials with an endpoint reference, which is either a TNS
//! alias or a direct host/port/service triple.

use crate::error::{OrawatchError, Result};
use crate::persistence::secrets::SecretStorage;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;
use sqlx::FromRow;

/// Password storage method for a saved connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordStorage {
    /// No password stored.
    None,
    /// Password stored in OS keyring.
    Keyring,
    /// Password stored as plaintext in the state database.
    Plaintext,
}

impl PasswordStorage {
    fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Keyring => "keyring",
            Self::Plaintext => "plaintext",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "keyring" => Self::Keyring,
            "plaintext" => Self::Plaintext,
            _ => Self::None,
        }
    }
}

/// Raw database row for a saved connection.
#[derive(Debug, Clone, FromRow)]
struct SavedConnectionRow {
    id: i64,
    name: String,
    username: String,
    tns_alias: Option<String>,
    host: Option<String>,
    port: Option<i64>,
    service: Option<String>,
    password_storage: String,
    password_plaintext: Option<String>,
    created_at: String,
    updated_at: String,
}

/// A saved database connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedConnection {
    pub id: i64,
    pub name: String,
    pub username: String,
    /// Resolved password. Only populated by the `_with_passwords` loaders;
    /// plain listings leave it None.
    #[serde(skip_serializing, default)]
    pub password: Option<String>,
    pub tns_alias: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub service: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl SavedConnection {
    /// Creates a new in-memory saved connection with no endpoint yet.
    pub fn new(name: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            username: username.into(),
            password: None,
            tns_alias: None,
            host: None,
            port: None,
            service: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    /// Returns a display-safe string (no password).
    pub fn display_string(&self) -> String {
        if let Some(alias) = &self.tns_alias {
            format!("{} ({}@{})", self.name, self.username, alias)
        } else {
            let host = self.host.as_deref().unwrap_or("localhost");
            let port = self.port.unwrap_or(1521);
            let service = self.service.as_deref().unwrap_or("?");
            format!("{} ({}@{}:{}/{})", self.name, self.username, host, port, service)
        }
    }
}

impl From<SavedConnectionRow> for SavedConnection {
    fn from(row: SavedConnectionRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            username: row.username,
            password: None,
            tns_alias: row.tns_alias,
            host: row.host,
            port: row.port.map(|p| p as u16),
            service: row.service,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_COLUMNS: &str = "id, name, username, tns_alias, host, port, service, \
     password_storage, password_plaintext, created_at, updated_at";

/// Lists all saved connections, ordered by name. Passwords are not loaded.
pub async fn list_connections(pool: &SqlitePool) -> Result<Vec<SavedConnection>> {
    let rows: Vec<SavedConnectionRow> = sqlx::query_as(&format!(
        "SELECT {SELECT_COLUMNS} FROM saved_connections ORDER BY name"
    ))
    .fetch_all(pool)
    .await
    .map_err(|e| OrawatchError::persistence(format!("Failed to list connections: {e}")))?;

    Ok(rows.into_iter().map(SavedConnection::from).collect())
}

/// Lists all saved connections with passwords resolved.
///
/// This is the read-all snapshot the batch orchestrator takes before a run;
/// the resolver then filters by id without touching the store again.
pub async fn list_connections_with_passwords(
    pool: &SqlitePool,
    secrets: &SecretStorage,
) -> Result<Vec<SavedConnection>> {
    let rows: Vec<SavedConnectionRow> = sqlx::query_as(&format!(
        "SELECT {SELECT_COLUMNS} FROM saved_connections ORDER BY name"
    ))
    .fetch_all(pool)
    .await
    .map_err(|e| OrawatchError::persistence(format!("Failed to list connections: {e}")))?;

    let mut connections = Vec::with_capacity(rows.len());
    for row in rows {
        let password = resolve_password(&row, secrets)?;
        let mut conn = SavedConnection::from(row);
        conn.password = password;
        connections.push(conn);
    }

    Ok(connections)
}

/// Gets a saved connection by id. Password is not loaded.
pub async fn get_connection(pool: &SqlitePool, id: i64) -> Result<Option<SavedConnection>> {
    let row: Option<SavedConnectionRow> = sqlx::query_as(&format!(
        "SELECT {SELECT_COLUMNS} FROM saved_connections WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| OrawatchError::persistence(format!("Failed to get connection: {e}")))?;

    Ok(row.map(SavedConnection::from))
}

/// Gets a saved connection by name. Password is not loaded.
pub async fn get_connection_by_name(
    pool: &SqlitePool,
    name: &str,
) -> Result<Option<SavedConnection>> {
    let row: Option<SavedConnectionRow> = sqlx::query_as(&format!(
        "SELECT {SELECT_COLUMNS} FROM saved_connections WHERE name = ?"
    ))
    .bind(name)
    .fetch_optional(pool)
    .await
    .map_err(|e| OrawatchError::persistence(format!("Failed to get connection: {e}")))?;

    Ok(row.map(SavedConnection::from))
}

/// Creates a new saved connection, returning its id.
pub async fn create_connection(
    pool: &SqlitePool,
    conn: &SavedConnection,
    password: Option<&str>,
    secrets: &SecretStorage,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO saved_connections (name, username, tns_alias, host, port, service)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&conn.name)
    .bind(&conn.username)
    .bind(&conn.tns_alias)
    .bind(&conn.host)
    .bind(conn.port.map(|p| p as i64))
    .bind(&conn.service)
    .execute(pool)
    .await
    .map_err(|e| {
        if e.to_string().contains("UNIQUE constraint") {
            OrawatchError::persistence(format!("Connection '{}' already exists", conn.name))
        } else {
            OrawatchError::persistence(format!("Failed to create connection: {e}"))
        }
    })?;

    let id = result.last_insert_rowid();

    if let Some(pwd) = password {
        store_password(pool, id, pwd, secrets).await?;
    }

    Ok(id)
}

/// Stores a password for an existing connection, preferring the keyring.
pub async fn store_password(
    pool: &SqlitePool,
    id: i64,
    password: &str,
    secrets: &SecretStorage,
) -> Result<()> {
    let (storage, plaintext) = if secrets.is_secure() {
        let key = SecretStorage::connection_password_key(id);
        secrets.store(&key, password)?;
        (PasswordStorage::Keyring, None)
    } else {
        (PasswordStorage::Plaintext, Some(password.to_string()))
    };

    sqlx::query(
        r#"
        UPDATE saved_connections
        SET password_storage = ?, password_plaintext = ?, updated_at = datetime('now')
        WHERE id = ?
        "#,
    )
    .bind(storage.as_str())
    .bind(&plaintext)
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| OrawatchError::persistence(format!("Failed to store password: {e}")))?;

    Ok(())
}

/// Deletes a saved connection and its keyring entry.
pub async fn delete_connection(pool: &SqlitePool, id: i64, secrets: &SecretStorage) -> Result<()> {
    let key = SecretStorage::connection_password_key(id);
    secrets.delete(&key)?;

    let result = sqlx::query("DELETE FROM saved_connections WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| OrawatchError::persistence(format!("Failed to delete connection: {e}")))?;

    if result.rows_affected() == 0 {
        return Err(OrawatchError::persistence(format!(
            "Connection id {} not found",
            id
        )));
    }

    Ok(())
}

/// Retrieves the password for a saved connection.
pub async fn get_connection_password(
    pool: &SqlitePool,
    id: i64,
    secrets: &SecretStorage,
) -> Result<Option<String>> {
    let row: Option<SavedConnectionRow> = sqlx::query_as(&format!(
        "SELECT {SELECT_COLUMNS} FROM saved_connections WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| OrawatchError::persistence(format!("Failed to get connection: {e}")))?;

    match row {
        Some(row) => resolve_password(&row, secrets),
        None => Err(OrawatchError::persistence(format!(
            "Connection id {} not found",
            id
        ))),
    }
}

fn resolve_password(row: &SavedConnectionRow, secrets: &SecretStorage) -> Result<Option<String>> {
    match PasswordStorage::from_str(&row.password_storage) {
        PasswordStorage::None => Ok(None),
        PasswordStorage::Keyring => {
            let key = SecretStorage::connection_password_key(row.id);
            let result = secrets.retrieve(&key)?;
            if result.is_none() {
                tracing::warn!(
                    "Password for connection '{}' stored in keyring but could not be retrieved. \
                     Keyring may be unavailable.",
                    row.name
                );
            }
            Ok(result)
        }
        PasswordStorage::Plaintext => Ok(row.password_plaintext.clone()),
    }
}
