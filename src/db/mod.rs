pub mod config;
pub mod operations;
pub mod schema;

use std::str::FromStr;
use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::db::config::DbConfig;
use crate::db::schema::{split_sql_statements, SCHEMA_SQL};

#[derive(Debug, Error)]
pub enum DbInitError {
    #[error("database config error: {0}")]
    Config(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Thin handle around the SQLite pool. WAL plus a generous busy timeout
/// keeps concurrent request handlers from tripping over the single writer.
#[derive(Clone)]
pub struct DatabaseProxy {
    pool: SqlitePool,
}

impl DatabaseProxy {
    pub async fn from_env() -> Result<Arc<Self>, DbInitError> {
        let config = DbConfig::from_env();
        Self::connect(&config.database_url).await
    }

    pub async fn connect(database_url: &str) -> Result<Arc<Self>, DbInitError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| DbInitError::Config(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(30))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        run_migrations(&pool).await?;

        Ok(Arc::new(Self { pool }))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

async fn run_migrations(pool: &SqlitePool) -> Result<(), DbInitError> {
    let version: Option<String> =
        sqlx::query_scalar(r#"SELECT "value" FROM "_db_metadata" WHERE "key" = 'schema_version'"#)
            .fetch_optional(pool)
            .await
            .unwrap_or(None);

    if version.is_some() {
        return Ok(());
    }

    let statements = split_sql_statements(SCHEMA_SQL);
    for stmt in statements {
        let sql: String = stmt
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        let trimmed = sql.trim();
        if trimmed.is_empty() {
            continue;
        }
        sqlx::query(trimmed).execute(pool).await?;
    }

    sqlx::query(
        r#"INSERT OR REPLACE INTO "_db_metadata" ("key", "value") VALUES ('schema_version', '1.0.0')"#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
