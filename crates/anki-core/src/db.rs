//! Opens the SQLite database and runs migrations, grounded on the
//! teacher's own bootstrap sequence in `spares_server/src/main.rs`
//! (database-exists check, then connect, then `sqlx::migrate::Migrator`).

use crate::Error;
use sqlx::migrate::{MigrateDatabase, Migrator};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Sqlite;
use std::path::Path;
use std::str::FromStr;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Opens (creating if absent) the database at `db_path`, runs any pending
/// migrations, and returns a ready connection pool. When `readonly` is
/// set, the pool is still opened read-write so migrations can run, but
/// callers are expected to consult `readonly` themselves before issuing
/// mutating statements (`spec.md` §6, the tool-level readonly gate).
///
/// # Errors
///
/// Returns `Error::Io` if `db_path`'s parent directory can't be created,
/// and `Error::Sqlx` for any connection or migration failure.
pub async fn open(db_path: &Path, readonly: bool) -> Result<SqlitePool, Error> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| Error::Io {
            description: format!("creating database directory {}", parent.display()),
            source,
        })?;
    }
    let url = format!("sqlite://{}", db_path.display());

    if readonly && !Sqlite::database_exists(&url).await.unwrap_or(false) {
        return Err(Error::Library(crate::LibraryError::ReadonlyRefused(
            "cannot create a new database in readonly mode".to_string(),
        )));
    }
    if !Sqlite::database_exists(&url).await.unwrap_or(false) {
        log::info!("creating database at {}", db_path.display());
        Sqlite::create_database(&url).await?;
    }

    let options = SqliteConnectOptions::from_str(&url)?.journal_mode(SqliteJournalMode::Wal);
    let pool = SqlitePoolOptions::new()
        .max_lifetime(None)
        .idle_timeout(None)
        .connect_with(options)
        .await?;

    MIGRATOR.run(&pool).await.map_err(|e| Error::Sqlx {
        source: sqlx::Error::Migrate(Box::new(e)),
    })?;

    Ok(pool)
}
