//! Postgres bootstrap for Bazaar
//!
//! Opens the pool, brings the schema up to date with the embedded
//! migrations and hands back the [`PgStore`] the services run on.

use sqlx::migrate::{MigrateError, Migrator};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::Config;
use crate::store::PgStore;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
const IDLE_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Failed to connect to database: {0}")]
    Connection(#[from] sqlx::Error),

    #[error("Failed to run migrations: {0}")]
    Migration(#[from] MigrateError),
}

/// Open the connection pool described by `config`
pub async fn create_pool(config: &Config) -> Result<PgPool, DbError> {
    tracing::info!(
        url = %config.database_url_masked(),
        max_connections = config.db_max_connections,
        "Opening database pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .min_connections(1)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .idle_timeout(IDLE_TIMEOUT)
        .connect(&config.database_url)
        .await?;

    Ok(pool)
}

/// Apply any pending migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    MIGRATOR.run(pool).await?;
    tracing::info!(known = MIGRATOR.iter().count(), "Database schema is up to date");
    Ok(())
}

/// Pool plus migrations, wrapped as the order/account/catalog store
pub async fn connect_store(config: &Config) -> Result<PgStore, DbError> {
    let pool = create_pool(config).await?;
    run_migrations(&pool).await?;
    Ok(PgStore::new(pool))
}
