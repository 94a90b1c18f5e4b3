//! User persistence.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

use finbook_core::UserId;

use crate::error::{StoreError, map_sqlx_error};

/// Stored user row. The password hash never leaves this crate boundary except
/// through [`UserRecord::password_hash`] for login verification.
#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn id(&self) -> UserId {
        UserId::from_uuid(self.user_id)
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct UserRepo {
    pool: PgPool,
}

impl UserRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, user), fields(email = %user.email), err)]
    pub async fn create(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let id = UserId::new();
        sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (user_id, email, display_name, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING user_id, email, display_name, password_hash, created_at, updated_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(user.email.to_ascii_lowercase())
        .bind(&user.display_name)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match map_sqlx_error("users.create", e) {
            StoreError::Conflict(_) => StoreError::Conflict("email already registered".into()),
            other => other,
        })
    }

    #[instrument(skip(self), fields(email = %email), err)]
    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT user_id, email, display_name, password_hash, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email.to_ascii_lowercase())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("users.find_by_email", e))
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    pub async fn get(&self, id: UserId) -> Result<UserRecord, StoreError> {
        sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT user_id, email, display_name, password_hash, created_at, updated_at
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("users.get", e))?
        .ok_or(StoreError::NotFound)
    }
}
