//! Credential store access
//!
//! The `users` table lives in the hosted Postgres database. Handlers talk to
//! it through the [`UserRepository`] trait so tests can swap in an in-memory
//! store.

use super::models::{ProfileChanges, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, QueryBuilder};
use thiserror::Error;
use uuid::Uuid;

/// Repository errors
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::EmailAlreadyExists
            }
            _ => RepositoryError::DatabaseError(err.to_string()),
        }
    }
}

/// Operations the auth layer needs from the credential store
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Exact, case-sensitive email lookup
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;

    /// Replace the stored credential
    async fn update_password(&self, id: Uuid, credential: &str) -> Result<(), RepositoryError>;

    /// Apply validated profile changes and return the updated record
    async fn update_profile(
        &self,
        id: Uuid,
        changes: &ProfileChanges,
    ) -> Result<User, RepositoryError>;

    /// Connectivity check for readiness probes
    async fn ping(&self) -> Result<(), RepositoryError>;
}

const USER_COLUMNS: &str = "id, email, password, role, status, first_name, last_name, \
     phone, company, job_title, avatar_url, created_at, updated_at";

/// Row as returned by Postgres; role and status are stored as text
#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password: String,
    role: String,
    status: String,
    first_name: String,
    last_name: String,
    phone: Option<String>,
    company: Option<String>,
    job_title: Option<String>,
    avatar_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse()
            .map_err(|e| RepositoryError::InvalidRecord(format!("user {}: {e}", row.id)))?;
        let status = row
            .status
            .parse()
            .map_err(|e| RepositoryError::InvalidRecord(format!("user {}: {e}", row.id)))?;

        Ok(User {
            id: row.id,
            email: row.email,
            password: row.password,
            role,
            status,
            first_name: row.first_name,
            last_name: row.last_name,
            phone: row.phone,
            company: row.company,
            job_title: row.job_title,
            avatar_url: row.avatar_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// PostgreSQL-backed user repository
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Connect a new pool
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| {
                RepositoryError::DatabaseError(format!("PostgreSQL connection failed: {e}"))
            })?;

        Ok(Self { pool })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 LIMIT 1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn update_password(&self, id: Uuid, credential: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE users SET password = $1, updated_at = NOW() WHERE id = $2")
            .bind(credential)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::UserNotFound);
        }
        Ok(())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: &ProfileChanges,
    ) -> Result<User, RepositoryError> {
        let mut query = QueryBuilder::<Postgres>::new("UPDATE users SET updated_at = NOW()");

        let text_columns = [
            ("email", &changes.email),
            ("first_name", &changes.first_name),
            ("last_name", &changes.last_name),
            ("phone", &changes.phone),
            ("company", &changes.company),
            ("job_title", &changes.job_title),
            ("avatar_url", &changes.avatar_url),
        ];
        for (column, value) in text_columns {
            if let Some(value) = value {
                query.push(format!(", {column} = "));
                query.push_bind(value.clone());
            }
        }
        if let Some(role) = changes.role {
            query.push(", role = ");
            query.push_bind(role.as_str());
        }
        if let Some(status) = changes.status {
            query.push(", status = ");
            query.push_bind(status.as_str());
        }

        query.push(" WHERE id = ");
        query.push_bind(id);
        query.push(format!(" RETURNING {USER_COLUMNS}"));

        let row = query
            .build_query_as::<UserRow>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::UserNotFound)?;

        User::try_from(row)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
