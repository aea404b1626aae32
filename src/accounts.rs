//! Account registration and credential verification.

use tracing::{debug, info};

use crate::db::{DEFAULT_ROLE, Database, User, is_unique_violation};
use crate::error::AuthError;
use crate::password;

pub const MAX_USERNAME_LENGTH: usize = 64;

#[derive(Clone)]
pub struct AccountService {
    db: Database,
}

impl AccountService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create an account. Returns the new user ID.
    ///
    /// Username and role are trimmed; a blank role means [`DEFAULT_ROLE`].
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        role: &str,
    ) -> Result<i64, AuthError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidInput);
        }
        if username.chars().count() > MAX_USERNAME_LENGTH {
            return Err(AuthError::InvalidInput);
        }
        let role = match role.trim() {
            "" => DEFAULT_ROLE,
            role => role,
        };

        let digest = hash_blocking(password.to_string()).await?;

        let id = self
            .db
            .users()
            .create(username, &digest, role)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AuthError::UserAlreadyExists
                } else {
                    AuthError::Database(e)
                }
            })?;

        info!(user_id = id, username, role, "Registered user");
        Ok(id)
    }

    /// Check a username and password.
    ///
    /// Unknown users and wrong passwords give the same error and cost about
    /// the same time. The password is checked before the active flag, so an
    /// inactive account is only reported to someone who knows its password.
    pub async fn verify_login(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let user = self.db.users().get_by_username(username).await?;

        let password = password.to_string();
        let Some(user) = user else {
            tokio::task::spawn_blocking(move || password::verify_against_dummy(&password))
                .await
                .map_err(|e| AuthError::PasswordHash(e.to_string()))?;
            debug!("Login for unknown username");
            return Err(AuthError::InvalidCredentials);
        };

        let digest = user.password_hash.clone();
        let matches =
            tokio::task::spawn_blocking(move || password::verify_password(&password, &digest))
                .await
                .map_err(|e| AuthError::PasswordHash(e.to_string()))?;

        if !matches {
            debug!(user_id = user.id, "Login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            debug!(user_id = user.id, "Login for inactive user");
            return Err(AuthError::InactiveUser);
        }

        Ok(user)
    }

    pub async fn get(&self, user_id: i64) -> Result<Option<User>, AuthError> {
        Ok(self.db.users().get_by_id(user_id).await?)
    }

    /// Activate or deactivate an account. Returns false for an unknown user.
    pub async fn set_active(&self, user_id: i64, active: bool) -> Result<bool, AuthError> {
        let updated = self.db.users().set_active(user_id, active).await?;
        if updated {
            info!(user_id, active, "Changed account status");
        }
        Ok(updated)
    }
}

async fn hash_blocking(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || password::hash_password(&password))
        .await
        .map_err(|e| AuthError::PasswordHash(e.to_string()))?
}
