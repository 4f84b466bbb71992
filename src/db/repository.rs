//! Database repository for user and resource queries.
//!
//! Filter expressions are compiled into bound parameters, never interpolated.

use std::sync::Arc;
use std::time::Duration;

use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::errors::AppError;
use crate::filters::{push_filter, FilterCache, FilterNode, FilterTarget};
use crate::models::{CreateResourceRequest, Flag, NewUser, Resource, User, USER_COLUMNS};

/// Filters backing the named user queries.
pub const ACTIVE_USERS_FILTER: &str = "active:eq:Y";
pub const INACTIVE_USERS_FILTER: &str = "active:eq:N";
pub const ADMIN_USERS_FILTER: &str = "active:eq:Y and admin:eq:Y";

/// Rows per multi-row INSERT; 12 bound columns each stays well under SQLite's parameter limit.
const MAX_INSERT_ROWS: usize = 2_000;

/// One page of query results.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: i64,
}

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
    filters: Arc<FilterCache>,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_filter_cache(pool, FilterCache::default())
    }

    pub fn with_filter_cache(pool: SqlitePool, filters: FilterCache) -> Self {
        Self {
            pool,
            filters: Arc::new(filters),
        }
    }

    pub fn with_cache_settings(pool: SqlitePool, max_size: usize, expires: Duration) -> Self {
        Self::with_filter_cache(pool, FilterCache::new(max_size, expires))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn filter_cache(&self) -> &FilterCache {
        &self.filters
    }

    /// Parse a filter and check it against `T`'s columns.
    fn compile<T: FilterTarget>(&self, filter: Option<&str>) -> Result<Option<Arc<FilterNode>>, AppError> {
        let node = self.filters.parse(filter)?;
        if let Some(node) = &node {
            crate::filters::sql::validate::<T>(node)?;
        }
        Ok(node)
    }

    // ==================== USER OPERATIONS ====================

    /// Count all users.
    pub async fn count_users(&self) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Insert users in a single transaction. Returns the number of rows written.
    pub async fn insert_users(&self, users: &[NewUser]) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for chunk in users.chunks(MAX_INSERT_ROWS) {
            let mut qb = QueryBuilder::<Sqlite>::new(
                "INSERT INTO users (userid, passwd, surname, forename, telno, addr1, addr2, city, state, postcode, active, admin) ",
            );
            qb.push_values(chunk, |mut b, user| {
                b.push_bind(&user.userid)
                    .push_bind(&user.passwd)
                    .push_bind(&user.surname)
                    .push_bind(&user.forename)
                    .push_bind(&user.telno)
                    .push_bind(&user.addr1)
                    .push_bind(&user.addr2)
                    .push_bind(&user.city)
                    .push_bind(&user.state)
                    .push_bind(&user.postcode)
                    .push_bind(user.active.as_str())
                    .push_bind(user.admin.as_str());
            });
            inserted += qb.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Get a user by ID.
    pub async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    /// Returns all users matching the filter expression, ordered by id.
    pub async fn get_users(&self, filter: Option<&str>) -> Result<Vec<User>, AppError> {
        let node = self.compile::<User>(filter)?;

        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM users", USER_COLUMNS));
        if let Some(node) = &node {
            qb.push(" WHERE ");
            push_filter::<User>(&mut qb, node)?;
        }
        qb.push(" ORDER BY id");

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(user_from_row).collect()
    }

    /// Returns one page of users matching the filter plus the total match count.
    pub async fn get_users_paginated(
        &self,
        filter: Option<&str>,
        page: u32,
        per_page: u32,
    ) -> Result<Page<User>, AppError> {
        if page == 0 || per_page == 0 {
            return Err(AppError::Validation(
                "page and per_page must be at least 1".to_string(),
            ));
        }
        let node = self.compile::<User>(filter)?;

        let mut count_qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM users");
        if let Some(node) = &node {
            count_qb.push(" WHERE ");
            push_filter::<User>(&mut count_qb, node)?;
        }
        let total_count: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let offset = (i64::from(page) - 1) * i64::from(per_page);
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM users", USER_COLUMNS));
        if let Some(node) = &node {
            qb.push(" WHERE ");
            push_filter::<User>(&mut qb, node)?;
        }
        qb.push(" ORDER BY id LIMIT ")
            .push_bind(i64::from(per_page))
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = qb.build().fetch_all(&self.pool).await?;
        let items = rows.iter().map(user_from_row).collect::<Result<_, _>>()?;

        Ok(Page { items, total_count })
    }

    /// Get list of active users.
    pub async fn get_active_users(&self) -> Result<Vec<User>, AppError> {
        self.get_users(Some(ACTIVE_USERS_FILTER)).await
    }

    /// Get list of inactive users.
    pub async fn get_inactive_users(&self) -> Result<Vec<User>, AppError> {
        self.get_users(Some(INACTIVE_USERS_FILTER)).await
    }

    /// Get list of active administrators.
    pub async fn get_admin_users(&self) -> Result<Vec<User>, AppError> {
        self.get_users(Some(ADMIN_USERS_FILTER)).await
    }

    /// Get one page of active users.
    pub async fn get_active_users_paginated(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Page<User>, AppError> {
        self.get_users_paginated(Some(ACTIVE_USERS_FILTER), page, per_page)
            .await
    }

    // ==================== RESOURCE OPERATIONS ====================

    /// List resources matching the filter expression, ordered by name.
    pub async fn list_resources(&self, filter: Option<&str>) -> Result<Vec<Resource>, AppError> {
        let node = self.compile::<Resource>(filter)?;

        let mut qb =
            QueryBuilder::<Sqlite>::new("SELECT id, name, resource_type, description FROM resources");
        if let Some(node) = &node {
            qb.push(" WHERE ");
            push_filter::<Resource>(&mut qb, node)?;
        }
        qb.push(" ORDER BY name, id");

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(resource_from_row).collect())
    }

    /// Get a resource by ID.
    pub async fn get_resource(&self, id: i64) -> Result<Option<Resource>, AppError> {
        let row =
            sqlx::query("SELECT id, name, resource_type, description FROM resources WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.as_ref().map(resource_from_row))
    }

    /// Create a new resource.
    pub async fn create_resource(
        &self,
        request: &CreateResourceRequest,
    ) -> Result<Resource, AppError> {
        let result =
            sqlx::query("INSERT INTO resources (name, resource_type, description) VALUES (?, ?, ?)")
                .bind(&request.name)
                .bind(&request.resource_type)
                .bind(&request.description)
                .execute(&self.pool)
                .await?;

        Ok(Resource {
            id: result.last_insert_rowid(),
            name: request.name.clone(),
            resource_type: request.resource_type.clone(),
            description: request.description.clone(),
        })
    }

    /// Delete a resource and its assignments.
    pub async fn delete_resource(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM resources WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Resource {} not found", id)));
        }
        Ok(())
    }

    /// Grant a resource to a user. Granting twice is a no-op.
    pub async fn assign_resource(&self, user_id: i64, resource_id: i64) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let user_exists: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;
        if user_exists == 0 {
            return Err(AppError::NotFound(format!("User {} not found", user_id)));
        }

        let resource_exists: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM resources WHERE id = ?)")
                .bind(resource_id)
                .fetch_one(&mut *tx)
                .await?;
        if resource_exists == 0 {
            return Err(AppError::NotFound(format!(
                "Resource {} not found",
                resource_id
            )));
        }

        sqlx::query("INSERT OR IGNORE INTO user_resources (user_id, resource_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(resource_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Revoke a resource from a user.
    pub async fn unassign_resource(&self, user_id: i64, resource_id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM user_resources WHERE user_id = ? AND resource_id = ?")
            .bind(user_id)
            .bind(resource_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Resource {} is not assigned to user {}",
                resource_id, user_id
            )));
        }
        Ok(())
    }

    /// List resources granted to a user.
    pub async fn list_user_resources(&self, user_id: i64) -> Result<Vec<Resource>, AppError> {
        if self.get_user(user_id).await?.is_none() {
            return Err(AppError::NotFound(format!("User {} not found", user_id)));
        }

        let rows = sqlx::query(
            r#"SELECT r.id, r.name, r.resource_type, r.description
               FROM resources r
               JOIN user_resources ur ON ur.resource_id = r.id
               WHERE ur.user_id = ?
               ORDER BY r.name, r.id"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(resource_from_row).collect())
    }
}

// Helper functions for row conversion

fn user_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<User, AppError> {
    let active: String = row.get("active");
    let admin: String = row.get("admin");
    Ok(User {
        id: row.get("id"),
        userid: row.get("userid"),
        passwd: row.get("passwd"),
        surname: row.get("surname"),
        forename: row.get("forename"),
        telno: row.get("telno"),
        addr1: row.get("addr1"),
        addr2: row.get("addr2"),
        city: row.get("city"),
        state: row.get("state"),
        postcode: row.get("postcode"),
        active: parse_flag("active", &active)?,
        admin: parse_flag("admin", &admin)?,
    })
}

fn parse_flag(column: &str, value: &str) -> Result<Flag, AppError> {
    value
        .parse::<Flag>()
        .map_err(|e| AppError::Database(format!("Column users.{}: {}", column, e)))
}

fn resource_from_row(row: &sqlx::sqlite::SqliteRow) -> Resource {
    Resource {
        id: row.get("id"),
        name: row.get("name"),
        resource_type: row.get("resource_type"),
        description: row.get("description"),
    }
}
