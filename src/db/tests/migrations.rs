use super::setup_db;
use crate::db::Database;
use tempfile::tempdir;

#[tokio::test]
async fn test_migrations_create_tables() {
    let (db, _temp) = setup_db().await;

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
    )
    .fetch_all(db.pool())
    .await
    .unwrap();

    assert!(tables.contains(&"seen_items".to_string()));
    assert!(tables.contains(&"runtime_state".to_string()));
    assert!(tables.contains(&"schema_version".to_string()));
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("relay.db");

    let db = Database::new(&path).await.unwrap();
    db.close().await;

    // Reopening must not re-apply v1
    let db = Database::new(&path).await.unwrap();
    let versions: Vec<i64> = sqlx::query_scalar("SELECT version FROM schema_version")
        .fetch_all(db.pool())
        .await
        .unwrap();
    assert_eq!(versions, vec![1]);
}

#[tokio::test]
async fn test_new_creates_parent_directory() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("state").join("relay.db");

    let db = Database::new(&path).await.unwrap();
    assert_eq!(db.count_seen_items().await.unwrap(), 0);
    assert!(path.exists());
}
