use crate::types::{AggregatorError, Result};
use chrono::Utc;
use sqlx::migrate::MigrateError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Shared SQLite handle holding both the source list and the article store.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database and bring the schema up to date.
    ///
    /// A file that SQLite reports as corrupt or not a database is moved aside to
    /// `<file>.corrupt-<timestamp>` and replaced by an empty one. Any other
    /// failure (locked file, I/O, migration mismatch) is returned untouched.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        match Self::open(options.clone()).await {
            Ok(db) => Ok(db),
            Err(e) => {
                let path = options.get_filename().to_path_buf();
                if !is_corruption(&e) || !is_on_disk(&path) {
                    return Err(e);
                }
                let quarantined = quarantine(&path)?;
                warn!(
                    "Database {} could not be opened ({}); moved to {} and starting empty",
                    path.display(),
                    e,
                    quarantined.display()
                );
                Self::open(options).await
            }
        }
    }

    async fn open(options: SqliteConnectOptions) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("Database ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

const SQLITE_CORRUPT: i64 = 11;
const SQLITE_NOTADB: i64 = 26;

fn is_corruption(error: &AggregatorError) -> bool {
    let sqlx_error = match error {
        AggregatorError::Database(e) => e,
        AggregatorError::Migration(MigrateError::Execute(e)) => e,
        AggregatorError::Migration(MigrateError::ExecuteMigration(e, _)) => e,
        _ => return false,
    };
    let sqlx::Error::Database(db_error) = sqlx_error else {
        return false;
    };
    // Extended result codes keep the primary code in the low byte.
    db_error
        .code()
        .and_then(|code| code.parse::<i64>().ok())
        .map(|code| code & 0xff)
        .is_some_and(|code| code == SQLITE_CORRUPT || code == SQLITE_NOTADB)
}

fn is_on_disk(path: &Path) -> bool {
    path.to_str() != Some(":memory:") && path.is_file()
}

fn quarantine(path: &Path) -> Result<PathBuf> {
    let mut target = path.as_os_str().to_owned();
    target.push(format!(".corrupt-{}", Utc::now().format("%Y%m%d%H%M%S")));
    let target = PathBuf::from(target);
    std::fs::rename(path, &target)?;
    Ok(target)
}
