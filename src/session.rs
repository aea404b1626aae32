//! Session management: issuing, rotating and revoking refresh tokens.
//!
//! Each refresh token row moves one way, from active to revoked (an explicit
//! write) or from active to expired (time passes). Nothing ever makes a row
//! active again.
//!
//! All session state lives in the database. `SessionManager` itself holds
//! only configuration and handles, so one instance is shared across request
//! tasks. Every multi-step operation runs in a single transaction; dropping
//! the transaction on an early return rolls it back.

use std::sync::Arc;

use sqlx::sqlite::SqliteConnection;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::db::{Database, RefreshTokenStore, SessionInfo, User, UserStore};
use crate::error::AuthError;
use crate::jwt::{AccessClaims, JwtCodec};
use crate::refresh::{self, RefreshSecret};

/// Sessions per user when not configured.
pub const DEFAULT_MAX_SESSIONS: usize = 3;

/// Longest refresh token lifetime accepted from configuration.
pub const MAX_REFRESH_TTL_DAYS: i64 = 3650;

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub refresh_ttl_days: i64,
    /// Active refresh tokens allowed per user. Zero disables the cap.
    pub max_sessions: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            refresh_ttl_days: 30,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

/// An access token and a new refresh secret, handed to the client once.
#[derive(Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub access_expires_at: i64,
    pub refresh_token: String,
    pub refresh_expires_at: i64,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("access_expires_at", &self.access_expires_at)
            .field("refresh_token", &"<redacted>")
            .field("refresh_expires_at", &self.refresh_expires_at)
            .finish()
    }
}

#[derive(Clone)]
pub struct SessionManager {
    db: Database,
    jwt: Arc<JwtCodec>,
    refresh_ttl_secs: i64,
    max_sessions: usize,
    clock: Clock,
}

impl SessionManager {
    pub fn new(db: Database, jwt: Arc<JwtCodec>, settings: &SessionSettings, clock: Clock) -> Self {
        Self {
            db,
            jwt,
            refresh_ttl_secs: settings.refresh_ttl_days.saturating_mul(24 * 60 * 60),
            max_sessions: settings.max_sessions,
            clock,
        }
    }

    pub fn jwt(&self) -> &JwtCodec {
        &self.jwt
    }

    /// Verify a bearer access token. Every failure is `InvalidToken`.
    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, AuthError> {
        self.jwt.verify(token).map_err(|e| {
            debug!(reason = %e, "Access token rejected");
            AuthError::from(e)
        })
    }

    /// Mint a token pair for an authenticated user.
    ///
    /// The new refresh row and any cap eviction commit together.
    pub async fn issue_for_user(&self, user: &User) -> Result<TokenPair, AuthError> {
        let mut tx = self.db.begin().await?;
        let pair = self.issue_in_tx(&mut tx, user).await?;
        tx.commit().await?;

        info!(user_id = user.id, "Issued session");
        Ok(pair)
    }

    async fn issue_in_tx(
        &self,
        conn: &mut SqliteConnection,
        user: &User,
    ) -> Result<TokenPair, AuthError> {
        let now = self.clock.now();
        let access = self.jwt.issue(user.id, &user.username, &user.role)?;
        let secret = RefreshSecret::generate()?;
        let refresh_expires_at = now.saturating_add(self.refresh_ttl_secs);

        RefreshTokenStore::insert(conn, user.id, &secret.digest, now, refresh_expires_at).await?;
        self.enforce_session_cap(conn, user.id, now).await?;

        Ok(TokenPair {
            access_token: access.token,
            access_expires_at: access.expires_at,
            refresh_token: secret.plaintext,
            refresh_expires_at,
        })
    }

    /// Revoke every active token beyond the newest `max_sessions`.
    async fn enforce_session_cap(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        now: i64,
    ) -> Result<u64, AuthError> {
        if self.max_sessions == 0 {
            return Ok(0);
        }

        let active = RefreshTokenStore::active_ids_newest_first(conn, user_id, now).await?;
        if active.len() <= self.max_sessions {
            return Ok(0);
        }

        let evicted = RefreshTokenStore::revoke_ids(conn, &active[self.max_sessions..], now).await?;
        debug!(user_id, evicted, "Session cap reached, revoked oldest sessions");
        Ok(evicted)
    }

    /// Exchange a refresh secret for a new pair.
    ///
    /// The presented token is revoked and its successor inserted in the same
    /// transaction, so a secret mints at most one successor. Concurrent
    /// rotations of one secret serialize on the revoking UPDATE and only the
    /// first succeeds.
    pub async fn rotate(&self, presented: &str) -> Result<(TokenPair, User), AuthError> {
        if presented.is_empty() {
            return Err(AuthError::InvalidRefreshToken);
        }

        let now = self.clock.now();
        let token_hash = refresh::digest(presented);
        let mut tx = self.db.begin().await?;

        let Some(token) = RefreshTokenStore::revoke_by_hash(&mut tx, &token_hash, now).await? else {
            debug!("Refresh token unknown or already revoked");
            return Err(AuthError::InvalidRefreshToken);
        };

        if token.expires_at <= now {
            debug!(token_id = token.id, "Refresh token expired");
            return Err(AuthError::InvalidRefreshToken);
        }

        let Some(user) = UserStore::get_by_id_in(&mut tx, token.user_id).await? else {
            debug!(token_id = token.id, "Refresh token owner no longer exists");
            return Err(AuthError::InvalidRefreshToken);
        };

        if !user.is_active {
            debug!(user_id = user.id, "Refresh token owner is inactive");
            return Err(AuthError::InvalidRefreshToken);
        }

        let pair = self.issue_in_tx(&mut tx, &user).await?;
        tx.commit().await?;

        info!(user_id = user.id, revoked_token_id = token.id, "Rotated session");
        Ok((pair, user))
    }

    /// Revoke one session. Unknown, revoked and expired tokens all give
    /// `InvalidRefreshToken`.
    pub async fn revoke(&self, presented: &str) -> Result<(), AuthError> {
        if presented.is_empty() {
            return Err(AuthError::InvalidRefreshToken);
        }

        let now = self.clock.now();
        let token_hash = refresh::digest(presented);
        let mut tx = self.db.begin().await?;

        let Some(token) = RefreshTokenStore::revoke_by_hash(&mut tx, &token_hash, now).await? else {
            debug!("Revoke of unknown or already revoked refresh token");
            return Err(AuthError::InvalidRefreshToken);
        };

        if token.expires_at <= now {
            debug!(token_id = token.id, "Revoke of expired refresh token");
            return Err(AuthError::InvalidRefreshToken);
        }

        tx.commit().await?;

        info!(user_id = token.user_id, token_id = token.id, "Revoked session");
        Ok(())
    }

    /// Revoke all of a user's active sessions. Returns how many were revoked.
    pub async fn revoke_all_for_user(&self, user_id: i64) -> Result<u64, AuthError> {
        let now = self.clock.now();
        let count = self.db.refresh_tokens().revoke_all_for_user(user_id, now).await?;

        info!(user_id, count, "Revoked all sessions");
        Ok(count)
    }

    /// Active sessions of a user, newest first.
    pub async fn list_active_sessions(&self, user_id: i64) -> Result<Vec<SessionInfo>, AuthError> {
        let now = self.clock.now();
        Ok(self.db.refresh_tokens().list_active(user_id, now).await?)
    }
}
