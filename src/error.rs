//! Domain errors for accounts and sessions.
//!
//! The variants stay distinguishable for logging. The HTTP layer collapses
//! them into a handful of opaque responses (see `api::error`).

use crate::jwt::JwtError;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Malformed or missing caller-supplied fields.
    #[error("invalid input")]
    InvalidInput,
    #[error("user already exists")]
    UserAlreadyExists,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("inactive user")]
    InactiveUser,
    /// Access token failed any verification step.
    #[error("invalid token")]
    InvalidToken,
    /// Refresh token unknown, revoked, expired, or owned by a missing/inactive user.
    #[error("invalid refresh token")]
    InvalidRefreshToken,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("entropy source failure: {0}")]
    Entropy(String),
    #[error("failed to sign token: {0}")]
    Signing(String),
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

impl AuthError {
    /// True for failures of the system rather than of the caller.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Entropy(_) | Self::Signing(_) | Self::PasswordHash(_)
        )
    }
}

impl From<JwtError> for AuthError {
    fn from(e: JwtError) -> Self {
        match e {
            JwtError::Encoding(e) => Self::Signing(e.to_string()),
            _ => Self::InvalidToken,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_classification() {
        assert!(AuthError::Entropy("os".into()).is_internal());
        assert!(AuthError::Database(sqlx::Error::PoolTimedOut).is_internal());
        assert!(!AuthError::InvalidRefreshToken.is_internal());
        assert!(!AuthError::InvalidCredentials.is_internal());
    }

    #[test]
    fn test_verify_failures_collapse_to_invalid_token() {
        let collapsed: AuthError = JwtError::IssuerMismatch.into();
        assert!(matches!(collapsed, AuthError::InvalidToken));

        let collapsed: AuthError = JwtError::Expired.into();
        assert!(matches!(collapsed, AuthError::InvalidToken));
    }
}
