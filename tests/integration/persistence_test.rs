//! Integration tests for the persistence layer.

use orawatch::persistence::{self, QueryDefinition, SavedConnection, StateDb};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

async fn create_test_db() -> (StateDb, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test_state.db");
    let db = StateDb::open(&path).await.unwrap();
    (db, dir)
}

#[tokio::test]
async fn test_state_db_creation() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.db");

    let db = StateDb::open(&path).await.unwrap();
    assert!(path.exists());
    db.close().await;
}

#[tokio::test]
async fn test_reopen_preserves_data() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.db");

    let db = StateDb::open(&path).await.unwrap();
    let id = persistence::queries::create_query(
        db.pool(),
        &QueryDefinition::new("persisted", "SELECT 1 FROM dual"),
    )
    .await
    .unwrap();
    db.close().await;

    let db = StateDb::open(&path).await.unwrap();
    let loaded = persistence::queries::get_query(db.pool(), id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.name, "persisted");
    db.close().await;
}

#[tokio::test]
async fn test_connection_crud_with_password() {
    let (db, _dir) = create_test_db().await;

    let mut conn = SavedConnection::new("mes", "app_user");
    conn.host = Some("db01".to_string());
    conn.port = Some(1521);
    conn.service = Some("MES".to_string());

    let id = persistence::connections::create_connection(
        db.pool(),
        &conn,
        Some("s3cret"),
        db.secrets(),
    )
    .await
    .unwrap();

    let retrieved = persistence::connections::get_connection(db.pool(), id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(retrieved.name, "mes");
    assert_eq!(retrieved.username, "app_user");
    // Plain lookups never carry the password.
    assert_eq!(retrieved.password, None);

    let password = persistence::connections::get_connection_password(db.pool(), id, db.secrets())
        .await
        .unwrap();
    assert_eq!(password.as_deref(), Some("s3cret"));

    let snapshot =
        persistence::connections::list_connections_with_passwords(db.pool(), db.secrets())
            .await
            .unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].password.as_deref(), Some("s3cret"));

    persistence::connections::delete_connection(db.pool(), id, db.secrets())
        .await
        .unwrap();
    assert!(persistence::connections::get_connection(db.pool(), id)
        .await
        .unwrap()
        .is_none());

    db.close().await;
}

#[tokio::test]
async fn test_query_definition_roundtrip_via_state_db() {
    let (db, _dir) = create_test_db().await;

    let mut def = QueryDefinition::new("hold lots", "SELECT * FROM lots WHERE status = 'HOLD'");
    def.tns_alias = Some("PRODDB".to_string());
    def.username = Some("mes_ro".to_string());
    def.password = Some("pw".to_string());
    def.notify = true;
    def.count_at_least = Some("1".to_string());
    def.check_columns = Some("STATUS".to_string());
    def.check_values = Some("OK".to_string());
    def.sort_order = 3;

    let id = persistence::queries::create_query(db.pool(), &def).await.unwrap();
    let loaded = persistence::queries::get_query(db.pool(), id)
        .await
        .unwrap()
        .unwrap();

    let mut expected = def;
    expected.id = id;
    expected.created_at = loaded.created_at.clone();
    expected.updated_at = loaded.updated_at.clone();
    assert_eq!(loaded, expected);

    db.close().await;
}

#[tokio::test]
async fn test_enabled_filter_matches_run_order() {
    let (db, _dir) = create_test_db().await;

    let mut late = QueryDefinition::new("late", "SELECT 1 FROM dual");
    late.sort_order = 9;
    let mut early = QueryDefinition::new("early", "SELECT 1 FROM dual");
    early.sort_order = 1;
    let mut off = QueryDefinition::new("off", "SELECT 1 FROM dual");
    off.enabled = false;

    persistence::queries::create_query(db.pool(), &late).await.unwrap();
    persistence::queries::create_query(db.pool(), &early).await.unwrap();
    persistence::queries::create_query(db.pool(), &off).await.unwrap();

    let enabled = persistence::queries::list_enabled(db.pool()).await.unwrap();
    let names: Vec<&str> = enabled.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["early", "late"]);

    db.close().await;
}
