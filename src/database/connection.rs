use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::error::BlogError;

pub type DbConnection = SqliteConnection;
pub type DbPool = Pool<ConnectionManager<DbConnection>>;

pub const ACCOUNTS_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/accounts");
pub const COMMENTS_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/comments");
pub const STATS_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/stats");

const BUSY_TIMEOUT_MS: u32 = 5000;

#[derive(Debug)]
struct ConnectionOptions {
    busy_timeout_ms: u32,
}

impl CustomizeConnection<DbConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, connection: &mut DbConnection) -> Result<(), diesel::r2d2::Error> {
        connection
            .batch_execute(&format!("PRAGMA busy_timeout = {};", self.busy_timeout_ms))
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

pub fn open_pool(database_url: &str, migrations: EmbeddedMigrations) -> Result<DbPool, BlogError> {
    let manager = ConnectionManager::<DbConnection>::new(database_url);
    let pool = Pool::builder()
        .connection_customizer(Box::new(ConnectionOptions {
            busy_timeout_ms: BUSY_TIMEOUT_MS,
        }))
        .build(manager)?;
    let mut connection = pool.get()?;
    let applied = connection
        .run_pending_migrations(migrations)
        .map_err(|e| BlogError::Migration(e.to_string()))?;
    if !applied.is_empty() {
        tracing::info!("applied {} migration(s) to {}", applied.len(), database_url);
    }
    Ok(pool)
}

/// The three relational stores. They share no connection and no transaction;
/// rows are related across them only by `(category, filename)`.
#[derive(Clone)]
pub struct Stores {
    pub accounts: DbPool,
    pub comments: DbPool,
    pub stats: DbPool,
}

impl Stores {
    pub fn open(accounts_url: &str, comments_url: &str, stats_url: &str) -> Result<Stores, BlogError> {
        Ok(Stores {
            accounts: open_pool(accounts_url, ACCOUNTS_MIGRATIONS)?,
            comments: open_pool(comments_url, COMMENTS_MIGRATIONS)?,
            stats: open_pool(stats_url, STATS_MIGRATIONS)?,
        })
    }
}
