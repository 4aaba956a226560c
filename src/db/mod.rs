pub mod cascade;
mod from_row;
pub mod queries;
mod schema;

pub use schema::init_db;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state holding the database pool.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    // Foreign key enforcement is per-connection in SQLite, so it has to be
    // part of connection init, not schema init.
    let manager = SqliteConnectionManager::file(database_path)
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON"));
    Pool::builder().max_size(10).build(manager)
}
