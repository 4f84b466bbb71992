//! Database module for SQLite persistence.
//!
//! Schema changes live in `migrations/` and are embedded at compile time.

mod repository;

pub use repository::*;

use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::errors::AppError;

/// Embedded schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Connection pool options.
#[derive(Debug, Clone)]
pub struct DbOptions {
    pub max_connections: u32,
    /// Emit sqlx statement events through tracing
    pub log_sql: bool,
}

impl Default for DbOptions {
    fn default() -> Self {
        Self {
            max_connections: 5,
            log_sql: false,
        }
    }
}

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path, options: &DbOptions) -> Result<SqlitePool, AppError> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut connect = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));
    if !options.log_sql {
        connect = connect.disable_statement_logging();
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(options.max_connections)
        .connect_with(connect)
        .await?;
    tracing::debug!("Opened database pool for {}", db_path.display());

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Apply pending migrations. Already-applied revisions are skipped.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), AppError> {
    tracing::info!("Running migrations...");
    MIGRATOR.run(pool).await?;
    tracing::info!("Migrations complete.");
    Ok(())
}

/// Remove the database file and its WAL side files.
///
/// Returns whether the main file was removed. Failures are logged, not returned.
pub async fn delete_database(db_path: &Path) -> bool {
    let deleted = match tokio::fs::remove_file(db_path).await {
        Ok(()) => {
            tracing::debug!("Database '{}' deleted successfully", db_path.display());
            true
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::error!("The database file '{}' does not exist.", db_path.display());
            false
        }
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            tracing::error!(
                "Permission denied to delete the database '{}'.",
                db_path.display()
            );
            false
        }
        Err(e) => {
            tracing::error!("Failed to delete database '{}': {}", db_path.display(), e);
            false
        }
    };

    for suffix in ["-wal", "-shm"] {
        let side = side_file(db_path, suffix);
        if let Err(e) = tokio::fs::remove_file(&side).await {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!("Failed to delete '{}': {}", side.display(), e);
            }
        }
    }

    deleted
}

fn side_file(db_path: &Path, suffix: &str) -> PathBuf {
    let mut name = db_path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_creates_schema() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("app.db");

        let pool = init_database(&db_path, &DbOptions::default()).await.unwrap();
        assert!(db_path.exists());

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE '\\_%' ESCAPE '\\' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(tables, vec!["resources", "user_resources", "users"]);
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("app.db");

        let pool = init_database(&db_path, &DbOptions::default()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool.close().await;

        // Reopening runs the migrator again against an up-to-date schema
        let pool = init_database(&db_path, &DbOptions::default()).await.unwrap();
        let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(applied, MIGRATOR.iter().count() as i64);
    }

    #[tokio::test]
    async fn test_check_constraint_on_flags() {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("app.db"), &DbOptions::default())
            .await
            .unwrap();

        let result = sqlx::query(
            "INSERT INTO users (userid, surname, forename, telno, active) VALUES ('u', 's', 'f', 't', 'X')",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_delete_database() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("app.db");
        let pool = init_database(&db_path, &DbOptions::default()).await.unwrap();
        pool.close().await;

        assert!(delete_database(&db_path).await);
        assert!(!db_path.exists());
        assert!(!side_file(&db_path, "-wal").exists());

        // Second attempt only logs
        assert!(!delete_database(&db_path).await);
    }
}
