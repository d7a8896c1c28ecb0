//! Integration tests for connection resolution over store-backed snapshots.

use orawatch::persistence::{self, QueryDefinition, SavedConnection, StateDb};
use orawatch::resolver::{Provenance, Resolver};
use orawatch::tns::TnsTable;
use std::path::PathBuf;
use tempfile::tempdir;

const TNS_CONTENT: &str = r#"
PRODDB =
  (DESCRIPTION =
    (ADDRESS = (PROTOCOL = TCP)(HOST = prod01)(PORT = 1521))
    (CONNECT_DATA = (SERVICE_NAME = PROD))
  )
"#;

async fn create_test_db() -> (StateDb, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.db");
    let db = StateDb::open(&path).await.unwrap();
    (db, dir)
}

#[tokio::test]
async fn test_saved_connection_snapshot_resolves() {
    let (db, _dir) = create_test_db().await;

    let mut conn = SavedConnection::new("prod", "app_user");
    conn.tns_alias = Some("PRODDB".to_string());
    let id = persistence::connections::create_connection(
        db.pool(),
        &conn,
        Some("pw"),
        db.secrets(),
    )
    .await
    .unwrap();

    let snapshot =
        persistence::connections::list_connections_with_passwords(db.pool(), db.secrets())
            .await
            .unwrap();
    let tns = TnsTable::parse(TNS_CONTENT, PathBuf::from("tnsnames.ora"));
    let resolver = Resolver::new(&snapshot, &tns);

    let mut def = QueryDefinition::new("q", "SELECT 1 FROM dual");
    def.saved_connection_id = Some(id);

    let descriptor = resolver.resolve(&def).unwrap();
    assert_eq!(descriptor.provenance, Provenance::SavedConnection);
    assert_eq!(descriptor.connect_string, "//prod01:1521/PROD");
    assert_eq!(descriptor.username, "app_user");
    assert_eq!(descriptor.password, "pw");

    db.close().await;
}

#[tokio::test]
async fn test_deleted_connection_leaves_stale_reference() {
    let (db, _dir) = create_test_db().await;

    let mut conn = SavedConnection::new("temp", "u");
    conn.host = Some("h".to_string());
    conn.port = Some(1521);
    conn.service = Some("S".to_string());
    let id = persistence::connections::create_connection(
        db.pool(),
        &conn,
        Some("pw"),
        db.secrets(),
    )
    .await
    .unwrap();

    let mut def = QueryDefinition::new("q", "SELECT 1 FROM dual");
    def.saved_connection_id = Some(id);
    persistence::queries::create_query(db.pool(), &def).await.unwrap();

    persistence::connections::delete_connection(db.pool(), id, db.secrets())
        .await
        .unwrap();

    // The definition still references the deleted id; resolution fails with
    // the not-found taxonomy entry rather than a panic or silent fallback.
    let snapshot =
        persistence::connections::list_connections_with_passwords(db.pool(), db.secrets())
            .await
            .unwrap();
    let tns = TnsTable::empty();
    let resolver = Resolver::new(&snapshot, &tns);

    let defs = persistence::queries::list_enabled(db.pool()).await.unwrap();
    let err = resolver.resolve(&defs[0]).unwrap_err();
    assert_eq!(err.category(), "Connection Not Found");

    db.close().await;
}

#[tokio::test]
async fn test_definition_credentials_resolve_alias_directly() {
    let (db, _dir) = create_test_db().await;

    let mut def = QueryDefinition::new("direct", "SELECT 1 FROM dual");
    def.tns_alias = Some("proddb".to_string());
    def.username = Some("scott".to_string());
    def.password = Some("tiger".to_string());
    let id = persistence::queries::create_query(db.pool(), &def).await.unwrap();

    let loaded = persistence::queries::get_query(db.pool(), id)
        .await
        .unwrap()
        .unwrap();
    let tns = TnsTable::parse(TNS_CONTENT, PathBuf::from("tnsnames.ora"));
    let resolver = Resolver::new(&[], &tns);

    let descriptor = resolver.resolve(&loaded).unwrap();
    assert_eq!(descriptor.provenance, Provenance::TnsAlias);
    assert_eq!(descriptor.connect_string, "//prod01:1521/PROD");

    db.close().await;
}
