//! Lead persistence
//!
//! `id` is the primary key and inserts never overwrite: a second insert of
//! the same id is reported as [`InsertOutcome::DuplicateSkipped`]. After
//! insertion a row changes only through client assignment and per-channel
//! delivery status updates.

use crate::utils::db_retry::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};
use chrono::NaiveDateTime;
use leadroute_common::db::{Lead, LeadDraft, StatusColumn, LEAD_COLUMNS};
use leadroute_common::time::now_utc_naive;
use leadroute_common::Result;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    DuplicateSkipped,
}

/// Optional filters for reporting queries
#[derive(Debug, Clone, Default)]
pub struct LeadFilter {
    pub tag: Option<String>,
    pub since: Option<NaiveDateTime>,
}

#[derive(Clone)]
pub struct LeadStore {
    pool: SqlitePool,
}

impl LeadStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a validated draft unless its id is already present
    pub async fn insert(&self, draft: &LeadDraft) -> Result<InsertOutcome> {
        if self.exists(&draft.id).await? {
            debug!(lead_id = %draft.id, "Lead already stored, skipping");
            return Ok(InsertOutcome::DuplicateSkipped);
        }

        let processed_at = now_utc_naive();
        let rows = retry_on_lock("lead insert", DEFAULT_MAX_LOCK_WAIT_MS, || async {
            let result = sqlx::query(
                r#"
                INSERT INTO leads (id, created_at, phone, tag, original_tag, processed_at, delivery_attempts)
                VALUES (?, ?, ?, ?, ?, ?, 0)
                ON CONFLICT(id) DO NOTHING
                "#,
            )
            .bind(&draft.id)
            .bind(draft.created_at)
            .bind(&draft.phone)
            .bind(&draft.tag)
            .bind(&draft.original_tag)
            .bind(processed_at)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected())
        })
        .await?;

        // A concurrent writer may have won between the check and the insert
        if rows == 0 {
            return Ok(InsertOutcome::DuplicateSkipped);
        }

        Ok(InsertOutcome::Inserted)
    }

    pub async fn exists(&self, id: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM leads WHERE id = ?)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Lead>> {
        let lead = sqlx::query_as::<_, Lead>(&format!("SELECT {} FROM leads WHERE id = ?", LEAD_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(lead)
    }

    pub async fn update_client(&self, id: &str, client_id: &str) -> Result<bool> {
        let rows = retry_on_lock("lead client update", DEFAULT_MAX_LOCK_WAIT_MS, || async {
            let result = sqlx::query("UPDATE leads SET client_id = ? WHERE id = ?")
                .bind(client_id)
                .bind(id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected())
        })
        .await?;
        Ok(rows > 0)
    }

    /// Set a channel's status and time without touching the attempt counter
    pub async fn update_channel_status(
        &self,
        id: &str,
        column: StatusColumn,
        status: &str,
        timestamp: NaiveDateTime,
    ) -> Result<bool> {
        let sql = format!(
            "UPDATE leads SET {} = ?, {} = ? WHERE id = ?",
            column.status_field(),
            column.time_field()
        );
        let rows = retry_on_lock("lead status update", DEFAULT_MAX_LOCK_WAIT_MS, || async {
            let result = sqlx::query(&sql)
                .bind(status)
                .bind(timestamp)
                .bind(id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected())
        })
        .await?;
        Ok(rows > 0)
    }

    pub async fn increment_attempts(&self, id: &str) -> Result<bool> {
        let rows = retry_on_lock("lead attempt increment", DEFAULT_MAX_LOCK_WAIT_MS, || async {
            let result = sqlx::query("UPDATE leads SET delivery_attempts = delivery_attempts + 1 WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected())
        })
        .await?;
        Ok(rows > 0)
    }

    /// Store an error status and count the attempt in one statement
    pub async fn record_failure(&self, id: &str, column: StatusColumn, status: &str) -> Result<bool> {
        let sql = format!(
            "UPDATE leads SET {} = ?, delivery_attempts = delivery_attempts + 1 WHERE id = ?",
            column.status_field()
        );
        let rows = retry_on_lock("lead failure record", DEFAULT_MAX_LOCK_WAIT_MS, || async {
            let result = sqlx::query(&sql)
                .bind(status)
                .bind(id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected())
        })
        .await?;
        Ok(rows > 0)
    }

    /// Leads matching `filter`, oldest first
    pub async fn query(&self, filter: &LeadFilter) -> Result<Vec<Lead>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!("SELECT {} FROM leads WHERE 1 = 1", LEAD_COLUMNS));
        push_filter(&mut builder, filter);
        builder.push(" ORDER BY created_at ASC, id ASC");

        let leads = builder.build_query_as::<Lead>().fetch_all(&self.pool).await?;
        Ok(leads)
    }

    /// Leads with at least one of `columns` not delivered and attempts below the bound
    pub async fn retry_candidates(
        &self,
        tag: Option<&str>,
        max_attempts: i64,
        columns: &[StatusColumn],
    ) -> Result<Vec<Lead>> {
        if columns.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM leads WHERE delivery_attempts < ",
            LEAD_COLUMNS
        ));
        builder.push_bind(max_attempts);

        builder.push(" AND (");
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                builder.push(" OR ");
            }
            builder.push(format!(
                "{field} IS NULL OR {field} NOT LIKE 'delivered%'",
                field = column.status_field()
            ));
        }
        builder.push(")");

        push_filter(
            &mut builder,
            &LeadFilter {
                tag: tag.map(str::to_string),
                since: None,
            },
        );
        builder.push(" ORDER BY created_at ASC, id ASC");

        let leads = builder.build_query_as::<Lead>().fetch_all(&self.pool).await?;
        Ok(leads)
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &LeadFilter) {
    if let Some(tag) = &filter.tag {
        builder.push(" AND tag = ");
        builder.push_bind(tag.clone());
    }
    if let Some(since) = filter.since {
        builder.push(" AND created_at >= ");
        builder.push_bind(since);
    }
}
