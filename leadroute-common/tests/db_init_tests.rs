//! Database initialization tests

use leadroute_common::db::init::init_database;
use leadroute_common::db::{Lead, LEAD_COLUMNS};
use tempfile::TempDir;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("leads.db");

    let pool = init_database(&db_path).await;
    assert!(pool.is_ok(), "Database initialization failed: {:?}", pool.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("leads.db");

    let pool1 = init_database(&db_path).await.unwrap();
    sqlx::query(
        "INSERT INTO clients (id, name, tag, use_crm, created_at) VALUES ('c1', 'Acme', 'A', 0, '2024-03-01 09:00:00')",
    )
    .execute(&pool1)
    .await
    .unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clients")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(count, 1, "Existing rows must survive re-initialization");
}

#[tokio::test]
async fn test_all_tables_and_indexes_created() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("leads.db")).await.unwrap();

    for table in ["clients", "leads", "raw_webhooks"] {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(exists, "table {} missing", table);
    }

    for index in ["idx_leads_tag", "idx_leads_created_at"] {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?)",
        )
        .bind(index)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(exists, "index {} missing", index);
    }
}

#[tokio::test]
async fn test_wal_mode_enabled() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("leads.db")).await.unwrap();

    let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(mode.to_lowercase(), "wal");
}

#[tokio::test]
async fn test_lead_row_decodes_with_default_attempts() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("leads.db")).await.unwrap();

    sqlx::query(
        "INSERT INTO leads (id, created_at, phone, tag, original_tag) VALUES ('L1', '2024-03-01 10:00:00', '79001234567', 'A', 'B12_A')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let lead: Lead = sqlx::query_as(&format!("SELECT {} FROM leads WHERE id = 'L1'", LEAD_COLUMNS))
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(lead.delivery_attempts, 0);
    assert_eq!(lead.original_tag_or_tag(), "B12_A");
    assert!(lead.sheet_delivery_status.is_none());
    assert_eq!(lead.created_at.to_string(), "2024-03-01 10:00:00");
}

#[tokio::test]
async fn test_legacy_leads_table_gains_delivery_columns() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("legacy.db");

    {
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE leads (id TEXT PRIMARY KEY, created_at TIMESTAMP NOT NULL, phone TEXT NOT NULL, tag TEXT NOT NULL, is_sent_to_client BOOLEAN DEFAULT 0)",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool.close().await;
    }

    let pool = init_database(&db_path).await.unwrap();
    let columns: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info('leads')")
        .fetch_all(&pool)
        .await
        .unwrap();
    for expected in ["client_id", "sheet_delivery_status", "crm_delivery_time", "delivery_attempts"] {
        assert!(columns.iter().any(|c| c == expected), "column {} missing", expected);
    }
}
