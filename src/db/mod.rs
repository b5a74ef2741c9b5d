//! Database pool setup and blocking-task helpers
//!
//! SQLite behind an r2d2 pool. Every connection gets its pragmas applied on
//! acquire; writers serialize on the database write lock with a busy timeout
//! so concurrent mutations of the same entity queue instead of failing.

use anyhow::{Context, Result};
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection};
use diesel::sql_query;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::error::CoreError;

pub type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

#[derive(Debug, Clone, Copy)]
struct PragmaCustomizer;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for PragmaCustomizer {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        // Referential integrity between wallets, matches and escrow rows
        sql_query("PRAGMA foreign_keys = ON;")
            .execute(conn)
            .map_err(diesel::r2d2::Error::QueryError)?;

        // Wait up to 5 seconds for the write lock instead of failing immediately
        sql_query("PRAGMA busy_timeout = 5000;")
            .execute(conn)
            .map_err(diesel::r2d2::Error::QueryError)?;

        // WAL keeps readers unblocked while a money mutation commits
        sql_query("PRAGMA journal_mode = WAL;")
            .execute(conn)
            .map_err(diesel::r2d2::Error::QueryError)?;

        sql_query("PRAGMA synchronous = NORMAL;")
            .execute(conn)
            .map_err(diesel::r2d2::Error::QueryError)?;

        Ok(())
    }
}

/// Create a connection pool for the given SQLite database path
pub fn create_pool(database_url: &str) -> Result<DbPool> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);

    let pool = r2d2::Pool::builder()
        .max_size(10)
        .connection_timeout(std::time::Duration::from_secs(30))
        .connection_customizer(Box::new(PragmaCustomizer))
        .build(manager)
        .context("Failed to create database connection pool")?;

    Ok(pool)
}

/// Create a pool and bring the schema up to date
pub fn init_pool(database_url: &str) -> Result<DbPool> {
    let pool = create_pool(database_url)?;

    let mut conn = pool.get().context("Failed to get connection for migrations")?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {e}"))?;
    if !applied.is_empty() {
        tracing::info!(count = applied.len(), "Applied pending migrations");
    }

    Ok(pool)
}

/// Run a synchronous database closure on the blocking thread pool.
///
/// All service mutations go through here; the closure is expected to open
/// its own transaction when it needs atomicity.
pub async fn with_conn<T, F>(pool: &DbPool, f: F) -> Result<T, CoreError>
where
    F: FnOnce(&mut SqliteConnection) -> Result<T, CoreError> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| CoreError::Internal(anyhow::anyhow!("Failed to get DB connection: {e}")))?;
        f(&mut conn)
    })
    .await
    .map_err(|e| CoreError::Internal(anyhow::anyhow!("Database task panicked: {e}")))?
}
