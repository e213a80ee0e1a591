//! Audit capture of arbitrary inbound push payloads

use crate::utils::db_retry::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};
use leadroute_common::time::now_utc_naive;
use leadroute_common::Result;
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct RawWebhookStore {
    pool: SqlitePool,
}

impl RawWebhookStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store the payload verbatim; returns the row id
    pub async fn capture(&self, payload: &serde_json::Value) -> Result<i64> {
        let raw_json = payload.to_string();
        let received_at = now_utc_naive();
        retry_on_lock("raw webhook capture", DEFAULT_MAX_LOCK_WAIT_MS, || async {
            let result = sqlx::query("INSERT INTO raw_webhooks (received_at, raw_json) VALUES (?, ?)")
                .bind(received_at)
                .bind(&raw_json)
                .execute(&self.pool)
                .await?;
            Ok(result.last_insert_rowid())
        })
        .await
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM raw_webhooks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
