//! Refresh token storage.
//!
//! Only the SHA-256 digest of a refresh secret is stored. A row is active
//! while `revoked_at` is NULL and the current time is before `expires_at`.
//! Functions that take a `SqliteConnection` are meant to run inside the
//! caller's transaction.

use serde::Serialize;
use sqlx::QueryBuilder;
use sqlx::sqlite::{Sqlite, SqliteConnection, SqlitePool};

/// A stored refresh token row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub id: i64,
    pub user_id: i64,
    pub token_hash: String,
    pub created_at: i64,
    pub expires_at: i64,
    pub revoked_at: Option<i64>,
}

impl RefreshTokenRecord {
    pub fn is_active(&self, now: i64) -> bool {
        self.revoked_at.is_none() && now < self.expires_at
    }
}

/// Public view of an active session. Never carries the digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct SessionInfo {
    pub id: i64,
    pub created_at: i64,
    pub expires_at: i64,
}

/// Row returned when a token is revoked by digest.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RevokedToken {
    pub id: i64,
    pub user_id: i64,
    pub expires_at: i64,
}

#[derive(Clone)]
pub struct RefreshTokenStore {
    pool: SqlitePool,
}

impl RefreshTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new refresh token row. Returns the row ID.
    pub async fn insert(
        conn: &mut SqliteConnection,
        user_id: i64,
        token_hash: &str,
        created_at: i64,
        expires_at: i64,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO refresh_tokens (user_id, token_hash, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(created_at)
        .bind(expires_at)
        .execute(&mut *conn)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// IDs of the user's active tokens, newest first.
    pub async fn active_ids_newest_first(
        conn: &mut SqliteConnection,
        user_id: i64,
        now: i64,
    ) -> Result<Vec<i64>, sqlx::Error> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT id FROM refresh_tokens
             WHERE user_id = ? AND revoked_at IS NULL AND expires_at > ?
             ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .bind(now)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Revoke the given rows. Already revoked rows keep their first revocation time.
    pub async fn revoke_ids(
        conn: &mut SqliteConnection,
        ids: &[i64],
        now: i64,
    ) -> Result<u64, sqlx::Error> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE refresh_tokens SET revoked_at = ");
        query.push_bind(now);
        query.push(" WHERE revoked_at IS NULL AND id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let result = query.build().execute(&mut *conn).await?;
        Ok(result.rows_affected())
    }

    /// Revoke the unrevoked row matching `token_hash` and return it.
    ///
    /// The row is returned even if it has already expired; callers decide
    /// whether to commit. `None` means no unrevoked row has this digest.
    pub async fn revoke_by_hash(
        conn: &mut SqliteConnection,
        token_hash: &str,
        now: i64,
    ) -> Result<Option<RevokedToken>, sqlx::Error> {
        sqlx::query_as(
            "UPDATE refresh_tokens SET revoked_at = ?
             WHERE token_hash = ? AND revoked_at IS NULL
             RETURNING id, user_id, expires_at",
        )
        .bind(now)
        .bind(token_hash)
        .fetch_optional(&mut *conn)
        .await
    }

    /// Get a token row by its digest, revoked or not.
    pub async fn get_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, user_id, token_hash, created_at, expires_at, revoked_at
             FROM refresh_tokens WHERE token_hash = ?",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
    }

    /// Revoke every active token of a user (logout everywhere).
    pub async fn revoke_all_for_user(&self, user_id: i64, now: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = ?
             WHERE user_id = ? AND revoked_at IS NULL AND expires_at > ?",
        )
        .bind(now)
        .bind(user_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// List the user's active sessions, newest first.
    pub async fn list_active(&self, user_id: i64, now: i64) -> Result<Vec<SessionInfo>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, created_at, expires_at FROM refresh_tokens
             WHERE user_id = ? AND revoked_at IS NULL AND expires_at > ?
             ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await
    }

    /// List all of a user's token rows, newest first.
    pub async fn list_all_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<RefreshTokenRecord>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, user_id, token_hash, created_at, expires_at, revoked_at
             FROM refresh_tokens WHERE user_id = ?
             ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }
}
