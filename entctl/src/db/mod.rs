//! PostgreSQL-backed implementations of the identity and owner boundaries.

pub mod errors;

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use tracing::warn;

use crate::api::models::pagination::PageRequest;
use crate::auth::password;
use crate::auth::principal::Role;
use crate::config::DatabaseConfig;
use crate::errors::Error;
use crate::identity::{IdentityAdapter, IdentityError, Owner, OwnerCurator, UserRecord};
use crate::types::UserId;

/// Embedded migrations, applied on startup.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Connect a pool using the configured settings.
pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.pool.max_connections)
        .min_connections(config.pool.min_connections)
        .acquire_timeout(Duration::from_secs(config.pool.acquire_timeout_secs))
        .connect(&config.url)
        .await
        .with_context(|| format!("Failed to connect to database at {}", config.url))?;
    Ok(pool)
}

/// Columns the owner listing may sort by. Anything else is a client error.
const OWNER_SORT_COLUMNS: &[&str] = &["key", "display_name", "created_at"];

#[derive(FromRow)]
struct UserRow {
    id: UserId,
    username: String,
    password_hash: Option<String>,
}

#[derive(FromRow)]
struct OwnerRow {
    id: crate::types::OwnerId,
    key: String,
    display_name: String,
    created_at: DateTime<Utc>,
}

impl From<OwnerRow> for Owner {
    fn from(row: OwnerRow) -> Self {
        Owner {
            id: row.id,
            key: row.key,
            display_name: row.display_name,
            created_at: row.created_at,
        }
    }
}

/// [`IdentityAdapter`] backed by the users, user_roles and user_tokens tables.
#[derive(Debug, Clone)]
pub struct PgIdentityAdapter {
    pool: PgPool,
}

impl PgIdentityAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn roles_for(&self, user_id: UserId) -> anyhow::Result<Vec<Role>> {
        let raw: Vec<(String,)> = sqlx::query_as("SELECT role FROM user_roles WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to load user roles")?;

        let mut roles = Vec::with_capacity(raw.len());
        for (name,) in raw {
            match Role::from_str(&name) {
                Ok(role) => roles.push(role),
                // A bad row must not grant or deny anything silently.
                Err(e) => warn!("Ignoring unparseable role for user {user_id}: {e}"),
            }
        }
        Ok(roles)
    }

    async fn user_row_by_login(&self, username: &str) -> anyhow::Result<Option<UserRow>> {
        sqlx::query_as::<_, UserRow>("SELECT id, username, password_hash FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to query user by login")
    }

    async fn record_for(&self, row: UserRow) -> anyhow::Result<UserRecord> {
        let roles = self.roles_for(row.id).await?;
        Ok(UserRecord {
            username: row.username,
            roles,
        })
    }
}

#[async_trait]
impl IdentityAdapter for PgIdentityAdapter {
    async fn find_by_login(&self, username: &str) -> Result<Option<UserRecord>, IdentityError> {
        match self.user_row_by_login(username).await? {
            Some(row) => Ok(Some(self.record_for(row).await?)),
            None => Ok(None),
        }
    }

    async fn validate_user(&self, username: &str, password: &str) -> Result<bool, IdentityError> {
        let Some(row) = self.user_row_by_login(username).await? else {
            return Ok(false);
        };
        let Some(hash) = row.password_hash else {
            // Users provisioned without a password cannot authenticate via basic.
            return Ok(false);
        };
        let valid = password::verify_string(password, &hash).map_err(|e| IdentityError(anyhow::anyhow!(e)))?;
        Ok(valid)
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<UserRecord>, IdentityError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT u.id, u.username, u.password_hash
             FROM user_tokens t
             JOIN users u ON u.id = t.user_id
             WHERE t.secret = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query user by token")?;

        match row {
            Some(row) => Ok(Some(self.record_for(row).await?)),
            None => Ok(None),
        }
    }
}

/// [`OwnerCurator`] backed by the owners table.
#[derive(Debug, Clone)]
pub struct PgOwnerCurator {
    pool: PgPool,
}

impl PgOwnerCurator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OwnerCurator for PgOwnerCurator {
    async fn list(&self, page: Option<&PageRequest>) -> crate::errors::Result<Vec<Owner>> {
        let mut sql = "SELECT id, key, display_name, created_at FROM owners".to_string();

        if let Some(page) = page {
            if let Some(sort_by) = page.sort_by.as_deref() {
                if !OWNER_SORT_COLUMNS.contains(&sort_by) {
                    return Err(Error::BadRequest {
                        message: format!("sort_by must be one of: {}", OWNER_SORT_COLUMNS.join(", ")),
                    });
                }
                sql.push_str(&format!(" ORDER BY {sort_by} {}", page.order.as_sql()));
            } else if page.paging {
                // Paging without an explicit sort still needs a stable order.
                sql.push_str(" ORDER BY key ASC");
            }
            if let (Some(limit), Some(offset)) = (page.limit(), page.offset()) {
                sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));
            }
        }

        let rows = sqlx::query_as::<_, OwnerRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(errors::DbError::from)?;
        Ok(rows.into_iter().map(Owner::from).collect())
    }

    async fn get(&self, key: &str) -> crate::errors::Result<Option<Owner>> {
        let row = sqlx::query_as::<_, OwnerRow>("SELECT id, key, display_name, created_at FROM owners WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(errors::DbError::from)?;
        Ok(row.map(Owner::from))
    }
}

/// Create the initial admin user on first startup, if configured and absent.
pub async fn create_initial_admin_user(pool: &PgPool, username: &str, admin_password: Option<&str>) -> crate::errors::Result<()> {
    let existing: Option<(UserId,)> = sqlx::query_as("SELECT id FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await
        .map_err(errors::DbError::from)?;
    if existing.is_some() {
        return Ok(());
    }

    let Some(password) = admin_password else {
        warn!("admin_password not configured; skipping initial admin user creation");
        return Ok(());
    };

    let password_hash = password::hash_string(password)?;
    let (user_id,): (UserId,) = sqlx::query_as("INSERT INTO users (username, password_hash) VALUES ($1, $2) RETURNING id")
        .bind(username)
        .bind(password_hash)
        .fetch_one(pool)
        .await
        .map_err(errors::DbError::from)?;

    sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2)")
        .bind(user_id)
        .bind(Role::SuperAdmin.to_string())
        .execute(pool)
        .await
        .map_err(errors::DbError::from)?;

    tracing::info!("Created initial admin user {username} ({})", crate::types::abbrev_uuid(&user_id));
    Ok(())
}
