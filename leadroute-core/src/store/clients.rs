//! Client persistence

use crate::utils::db_retry::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};
use leadroute_common::db::{Client, ClientUpdate, NewClient, CLIENT_COLUMNS};
use leadroute_common::time::now_utc_naive;
use leadroute_common::uuid_utils::new_client_id;
use leadroute_common::Result;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

#[derive(Clone)]
pub struct ClientStore {
    pool: SqlitePool,
}

impl ClientStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<Client>> {
        let clients = sqlx::query_as::<_, Client>(&format!("SELECT {} FROM clients ORDER BY name, tag", CLIENT_COLUMNS))
            .fetch_all(&self.pool)
            .await?;
        Ok(clients)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Client>> {
        let client = sqlx::query_as::<_, Client>(&format!("SELECT {} FROM clients WHERE id = ?", CLIENT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(client)
    }

    pub async fn find_by_tag(&self, tag: &str) -> Result<Option<Client>> {
        let client = sqlx::query_as::<_, Client>(&format!("SELECT {} FROM clients WHERE tag = ?", CLIENT_COLUMNS))
            .bind(tag)
            .fetch_optional(&self.pool)
            .await?;
        Ok(client)
    }

    /// Insert a new client; returns its generated id
    pub async fn insert(&self, client: &NewClient) -> Result<String> {
        let id = new_client_id();
        let created_at = now_utc_naive();
        retry_on_lock("client insert", DEFAULT_MAX_LOCK_WAIT_MS, || async {
            sqlx::query(
                r#"
                INSERT INTO clients (id, name, tag, spreadsheet_id, sheet_name, use_crm, webhook_url, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&id)
            .bind(&client.name)
            .bind(&client.tag)
            .bind(&client.spreadsheet_id)
            .bind(&client.sheet_name)
            .bind(client.use_crm)
            .bind(&client.webhook_url)
            .bind(created_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await?;
        Ok(id)
    }

    /// Apply the set fields of `update`; false when nothing matched or nothing to set
    pub async fn update(&self, id: &str, update: &ClientUpdate) -> Result<bool> {
        if update.is_empty() {
            return Ok(false);
        }

        let rows = retry_on_lock("client update", DEFAULT_MAX_LOCK_WAIT_MS, || async {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE clients SET ");
            {
                let mut fields = builder.separated(", ");
                if let Some(name) = &update.name {
                    fields.push("name = ").push_bind_unseparated(name.clone());
                }
                if let Some(tag) = &update.tag {
                    fields.push("tag = ").push_bind_unseparated(tag.clone());
                }
                if let Some(spreadsheet_id) = &update.spreadsheet_id {
                    fields.push("spreadsheet_id = ").push_bind_unseparated(spreadsheet_id.clone());
                }
                if let Some(sheet_name) = &update.sheet_name {
                    fields.push("sheet_name = ").push_bind_unseparated(sheet_name.clone());
                }
                if let Some(use_crm) = update.use_crm {
                    fields.push("use_crm = ").push_bind_unseparated(use_crm);
                }
                if let Some(webhook_url) = &update.webhook_url {
                    fields.push("webhook_url = ").push_bind_unseparated(webhook_url.clone());
                }
            }
            builder.push(" WHERE id = ").push_bind(id.to_string());

            let result = builder.build().execute(&self.pool).await?;
            Ok(result.rows_affected())
        })
        .await?;

        Ok(rows > 0)
    }
}
