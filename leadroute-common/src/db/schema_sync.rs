//! Column synchronization for databases created by older releases
//!
//! `CREATE TABLE IF NOT EXISTS` leaves an existing table untouched, so a
//! `leads` table from a release without per-channel delivery tracking would
//! lack the status/time/attempt columns. After table creation every known
//! table is introspected with `PRAGMA table_info` and missing columns are
//! added with `ALTER TABLE ... ADD COLUMN`.
//!
//! Only additive changes are made. Type or constraint differences are logged.

use crate::Result;
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

/// Expected column of a managed table
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: &'static str,
    /// SQL type (TEXT, INTEGER, TIMESTAMP, BOOLEAN)
    pub sql_type: &'static str,
    /// DEFAULT clause value used when the column is added later
    pub default_value: Option<&'static str>,
}

impl ColumnDefinition {
    pub const fn new(name: &'static str, sql_type: &'static str) -> Self {
        Self {
            name,
            sql_type,
            default_value: None,
        }
    }

    pub const fn default(mut self, value: &'static str) -> Self {
        self.default_value = Some(value);
        self
    }

    fn add_column_sql(&self, table: &str) -> String {
        match self.default_value {
            Some(default) => format!(
                "ALTER TABLE {} ADD COLUMN {} {} DEFAULT {}",
                table, self.name, self.sql_type, default
            ),
            None => format!("ALTER TABLE {} ADD COLUMN {} {}", table, self.name, self.sql_type),
        }
    }
}

/// Column as reported by `PRAGMA table_info`
#[derive(Debug, Clone)]
pub struct ActualColumn {
    pub cid: i32,
    pub name: String,
    pub type_name: String,
}

/// Declarative description of a managed table
pub trait TableSchema {
    fn table_name() -> &'static str;

    /// Columns that may be missing from older databases
    fn expected_columns() -> Vec<ColumnDefinition>;
}

pub struct LeadsTable;

impl TableSchema for LeadsTable {
    fn table_name() -> &'static str {
        "leads"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("original_tag", "TEXT"),
            ColumnDefinition::new("processed_at", "TIMESTAMP"),
            ColumnDefinition::new("client_id", "TEXT"),
            ColumnDefinition::new("sheet_delivery_status", "TEXT"),
            ColumnDefinition::new("sheet_delivery_time", "TIMESTAMP"),
            ColumnDefinition::new("crm_delivery_status", "TEXT"),
            ColumnDefinition::new("crm_delivery_time", "TIMESTAMP"),
            ColumnDefinition::new("delivery_attempts", "INTEGER").default("0"),
        ]
    }
}

pub struct ClientsTable;

impl TableSchema for ClientsTable {
    fn table_name() -> &'static str {
        "clients"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("spreadsheet_id", "TEXT"),
            ColumnDefinition::new("sheet_name", "TEXT"),
            ColumnDefinition::new("use_crm", "BOOLEAN").default("0"),
            ColumnDefinition::new("webhook_url", "TEXT"),
        ]
    }
}

pub struct SchemaIntrospector;

impl SchemaIntrospector {
    /// Columns of `table_name` ordered by position
    pub async fn introspect_table(pool: &SqlitePool, table_name: &str) -> Result<Vec<ActualColumn>> {
        let query = format!("PRAGMA table_info({})", table_name);
        let rows = sqlx::query(&query).fetch_all(pool).await?;

        let mut columns: Vec<ActualColumn> = rows
            .iter()
            .map(|row| ActualColumn {
                cid: row.get("cid"),
                name: row.get("name"),
                type_name: row.get("type"),
            })
            .collect();
        columns.sort_by_key(|c| c.cid);

        Ok(columns)
    }

    pub async fn table_exists(pool: &SqlitePool, table_name: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
        )
        .bind(table_name)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }
}

/// Expected columns absent from `actual`
pub fn missing_columns(expected: &[ColumnDefinition], actual: &[ActualColumn]) -> Vec<ColumnDefinition> {
    expected
        .iter()
        .filter(|col| !actual.iter().any(|a| a.name.eq_ignore_ascii_case(col.name)))
        .cloned()
        .collect()
}

pub struct SchemaSync;

impl SchemaSync {
    /// Add every missing column of `T`; returns how many were added
    pub async fn sync_table<T: TableSchema>(pool: &SqlitePool) -> Result<usize> {
        let table_name = T::table_name();

        if !SchemaIntrospector::table_exists(pool, table_name).await? {
            warn!("Schema sync: table '{}' does not exist", table_name);
            return Ok(0);
        }

        let actual = SchemaIntrospector::introspect_table(pool, table_name).await?;
        let missing = missing_columns(&T::expected_columns(), &actual);

        for column in &missing {
            info!("Schema sync: adding column {}.{} ({})", table_name, column.name, column.sql_type);
            match sqlx::query(&column.add_column_sql(table_name)).execute(pool).await {
                Ok(_) => {}
                Err(sqlx::Error::Database(db_err)) if db_err.message().contains("duplicate column") => {
                    info!("Column {}.{} already added concurrently", table_name, column.name);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(missing.len())
    }
}

/// Bring every managed table up to the current column set
pub async fn sync_all_table_schemas(pool: &SqlitePool) -> Result<()> {
    let added = SchemaSync::sync_table::<ClientsTable>(pool).await?
        + SchemaSync::sync_table::<LeadsTable>(pool).await?;
    if added > 0 {
        info!("Schema sync added {} column(s)", added);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        // One connection: every in-memory connection is its own database
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[test]
    fn test_add_column_sql() {
        let plain = ColumnDefinition::new("client_id", "TEXT");
        assert_eq!(plain.add_column_sql("leads"), "ALTER TABLE leads ADD COLUMN client_id TEXT");

        let with_default = ColumnDefinition::new("delivery_attempts", "INTEGER").default("0");
        assert_eq!(
            with_default.add_column_sql("leads"),
            "ALTER TABLE leads ADD COLUMN delivery_attempts INTEGER DEFAULT 0"
        );
    }

    #[tokio::test]
    async fn test_legacy_leads_table_is_upgraded() {
        let pool = setup_test_db().await;

        // Shape of a release that tracked a single sent flag
        sqlx::query(
            "CREATE TABLE leads (id TEXT PRIMARY KEY, created_at TIMESTAMP, phone TEXT, tag TEXT, is_sent_to_client BOOLEAN)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO leads (id, created_at, phone, tag) VALUES ('L1', '2024-03-01 10:00:00', '79001234567', 'A')")
            .execute(&pool)
            .await
            .unwrap();

        let added = SchemaSync::sync_table::<LeadsTable>(&pool).await.unwrap();
        assert_eq!(added, LeadsTable::expected_columns().len());

        let attempts: i64 = sqlx::query_scalar("SELECT delivery_attempts FROM leads WHERE id = 'L1'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(attempts, 0);

        // Second pass is a no-op
        assert_eq!(SchemaSync::sync_table::<LeadsTable>(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_table_is_skipped() {
        let pool = setup_test_db().await;
        assert_eq!(SchemaSync::sync_table::<ClientsTable>(&pool).await.unwrap(), 0);
        assert!(!SchemaIntrospector::table_exists(&pool, "clients").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_columns_is_case_insensitive() {
        let pool = setup_test_db().await;
        sqlx::query("CREATE TABLE clients (id TEXT, Spreadsheet_ID TEXT)")
            .execute(&pool)
            .await
            .unwrap();

        let actual = SchemaIntrospector::introspect_table(&pool, "clients").await.unwrap();
        let missing = missing_columns(&ClientsTable::expected_columns(), &actual);
        let names: Vec<&str> = missing.iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["sheet_name", "use_crm", "webhook_url"]);
    }
}
