//! Application lifecycle: database setup, user population, the
//! active/admin/inactive query benchmark and teardown.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::config::Settings;
use crate::db::{self, DbOptions, Repository};
use crate::errors::AppError;
use crate::fixtures::UserFactory;
use crate::models::UsersReport;

/// Owns the repository between `setup` and `teardown`.
#[derive(Default)]
pub struct App {
    repo: Option<Repository>,
    db_path: Option<PathBuf>,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the database described by `settings` and apply migrations.
    pub async fn setup(&mut self, settings: &Settings) -> Result<(), AppError> {
        tracing::debug!("Setting up application (debug={})", settings.debug);
        tracing::debug!(
            "Base directory {}, data directory {}",
            settings.base_dir.display(),
            settings.data.absolute_dir.display()
        );

        let options = DbOptions {
            max_connections: settings.db.max_connections,
            log_sql: settings.db.log_sql,
        };
        let pool = db::init_database(&settings.db.absolute_db_path, &options).await?;
        self.repo = Some(Repository::with_cache_settings(
            pool,
            settings.cache.max_size,
            Duration::from_secs(settings.cache.expires_secs),
        ));
        self.db_path = Some(settings.db.absolute_db_path.clone());

        tracing::info!("Database {} ready at {}", settings.db.db_name, settings.db.uri);
        Ok(())
    }

    /// Repository handle; fails before `setup`.
    pub fn repo(&self) -> Result<&Repository, AppError> {
        self.repo.as_ref().ok_or_else(|| {
            AppError::NotConfigured("Application is not configured, call setup first".to_string())
        })
    }

    /// Fill an empty `users` table with `count` generated users.
    ///
    /// Returns the number of users written; 0 when the table already has rows.
    pub async fn populate_users(&self, count: usize, batch_size: usize) -> Result<u64, AppError> {
        let repo = self.repo()?;
        if batch_size == 0 {
            return Err(AppError::Validation(
                "batch_size must be at least 1".to_string(),
            ));
        }

        if repo.count_users().await? > 0 {
            tracing::warn!("User table is not empty. Skip initialization");
            return Ok(0);
        }

        tracing::info!("User populating: Generate {} users", count);
        let batch_size = batch_size.min(count.max(1));
        let batches = count.div_ceil(batch_size);
        let mut factory = UserFactory::new();
        let mut created = 0u64;

        for batch in 0..batches {
            let size = batch_size.min(count - batch * batch_size);
            let users = factory.build_batch(size);
            created += repo.insert_users(&users).await?;
            tracing::debug!(
                "Inserted batch {}/{} ({} users, {} total)",
                batch + 1,
                batches,
                size,
                created
            );
        }

        tracing::info!("Successfully created {} users!", created);
        Ok(created)
    }

    /// Run the active, admin and inactive user queries `execution_count` times.
    ///
    /// The three queries of one round run concurrently. Returns the last round's rows.
    pub async fn get_users(&self, execution_count: usize) -> Result<UsersReport, AppError> {
        let repo = self.repo()?;
        tracing::info!("Retrieving active users {} times", execution_count);

        let started = Instant::now();
        let mut report = UsersReport::default();
        for _ in 0..execution_count {
            let (active_users, admin_users, inactive_users) = tokio::try_join!(
                repo.get_active_users(),
                repo.get_admin_users(),
                repo.get_inactive_users(),
            )?;
            report = UsersReport {
                inactive_users,
                active_users,
                admin_users,
            };
        }
        let elapsed = started.elapsed();

        tracing::info!(
            execution_time = elapsed.as_secs_f64(),
            "Function get_users executed in {:.4} seconds",
            elapsed.as_secs_f64()
        );
        let stats = repo.filter_cache().stats();
        tracing::debug!(
            hits = stats.hits,
            misses = stats.misses,
            entries = stats.entries,
            "Filter cache statistics"
        );

        Ok(report)
    }

    /// Close the pool and delete the database file.
    pub async fn teardown(&mut self) {
        if let Some(repo) = self.repo.take() {
            repo.pool().close().await;
        }
        if let Some(path) = self.db_path.take() {
            db::delete_database(&path).await;
        }
        tracing::debug!("Teardown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings(base: &std::path::Path) -> Settings {
        let contents = r#"
            [data]
            dir = "data"

            [db]
            name = "app_test"
            fl_name_template = "{}.db"
            engine_template = "sqlite:///{}"

            [log]
            dir = "logs"
            name = "test"
        "#;
        Settings::from_toml_str(contents, Vec::new(), base).unwrap()
    }

    #[tokio::test]
    async fn test_operations_before_setup_fail() {
        let app = App::new();
        assert!(app.repo().is_err());
        assert!(matches!(
            app.populate_users(10, 5).await,
            Err(AppError::NotConfigured(_))
        ));
        assert!(matches!(app.get_users(1).await, Err(AppError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn test_populate_and_benchmark() {
        let temp_dir = TempDir::new().unwrap();
        let settings = settings(temp_dir.path());
        let mut app = App::new();
        app.setup(&settings).await.unwrap();

        // Batch larger than count is clamped
        assert_eq!(app.populate_users(25, 100).await.unwrap(), 25);
        assert_eq!(app.repo().unwrap().count_users().await.unwrap(), 25);

        // Second run is skipped
        assert_eq!(app.populate_users(25, 10).await.unwrap(), 0);

        let report = app.get_users(3).await.unwrap();
        assert_eq!(report.active_users.len() + report.inactive_users.len(), 25);
        assert!(report.active_users.iter().all(|u| u.active.is_yes()));
        assert!(report.inactive_users.iter().all(|u| !u.active.is_yes()));
        assert!(report
            .admin_users
            .iter()
            .all(|u| u.active.is_yes() && u.admin.is_yes()));

        let stats = app.repo().unwrap().filter_cache().stats();
        assert_eq!(stats.misses, 3);
        assert!(stats.hits >= 6);

        app.teardown().await;
        assert!(!settings.db.absolute_db_path.exists());
        assert!(app.repo().is_err());
    }

    #[tokio::test]
    async fn test_uneven_batches() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = App::new();
        app.setup(&settings(temp_dir.path())).await.unwrap();

        assert_eq!(app.populate_users(23, 10).await.unwrap(), 23);
        assert!(matches!(
            app.populate_users(5, 0).await,
            Err(AppError::Validation(_))
        ));
        app.teardown().await;
    }

    #[tokio::test]
    async fn test_zero_executions_return_empty_report() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = App::new();
        app.setup(&settings(temp_dir.path())).await.unwrap();
        app.populate_users(5, 5).await.unwrap();

        let report = app.get_users(0).await.unwrap();
        assert!(report.active_users.is_empty());
        assert!(report.admin_users.is_empty());
        assert!(report.inactive_users.is_empty());
        app.teardown().await;
    }
}
