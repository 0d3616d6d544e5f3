use anyhow::Result;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, PgPool, Row};

use crate::models::ClientConfig;

pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        let db = Database { pool };
        db.init_tables().await?;
        Ok(db)
    }

    /// Wraps an existing pool without touching the schema.
    #[cfg(test)]
    pub fn from_pool(pool: PgPool) -> Self {
        Database { pool }
    }

    async fn init_tables(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS client_configs (
                client_id TEXT PRIMARY KEY,
                config JSONB NOT NULL DEFAULT '{}'::jsonb,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_client_configs(&self) -> Result<Vec<ClientConfig>> {
        let rows = sqlx::query(
            "SELECT client_id, config, updated_at FROM client_configs ORDER BY updated_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(client_config_from_row).collect())
    }

    pub async fn get_client_config(&self, client_id: &str) -> Result<Option<ClientConfig>> {
        let config = sqlx::query(
            "SELECT client_id, config, updated_at FROM client_configs WHERE client_id = $1",
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?
        .map(|row| client_config_from_row(&row));

        Ok(config)
    }

    pub async fn upsert_client_config(&self, client_id: &str, config: &Value) -> Result<ClientConfig> {
        let row = sqlx::query(
            r#"
            INSERT INTO client_configs (client_id, config)
            VALUES ($1, $2)
            ON CONFLICT (client_id)
            DO UPDATE SET config = EXCLUDED.config, updated_at = now()
            RETURNING client_id, config, updated_at
            "#,
        )
        .bind(client_id)
        .bind(config)
        .fetch_one(&self.pool)
        .await?;

        Ok(client_config_from_row(&row))
    }

    pub async fn update_client_config(&self, client_id: &str, config: &Value) -> Result<Option<ClientConfig>> {
        let updated = sqlx::query(
            r#"
            UPDATE client_configs
            SET config = $2, updated_at = now()
            WHERE client_id = $1
            RETURNING client_id, config, updated_at
            "#,
        )
        .bind(client_id)
        .bind(config)
        .fetch_optional(&self.pool)
        .await?
        .map(|row| client_config_from_row(&row));

        Ok(updated)
    }

    /// Returns false when no row matched.
    pub async fn delete_client_config(&self, client_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM client_configs WHERE client_id = $1")
            .bind(client_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn client_config_from_row(row: &PgRow) -> ClientConfig {
    ClientConfig {
        client_id: row.get(0),
        config: row.get(1),
        updated_at: row.get(2),
    }
}
