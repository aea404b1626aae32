//! Axum extractors for authentication.

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::debug;

use super::bearer::bearer_token;
use super::errors::{ApiAuthError, AuthErrorKind};
use super::state::HasAuthBackend;
use super::types::AuthenticatedUser;

/// A role requirement checked after the token is verified.
pub trait RoleConstraint {
    fn allows(role: &str) -> bool;
}

/// Any authenticated caller.
pub struct AnyRole;

impl RoleConstraint for AnyRole {
    fn allows(_role: &str) -> bool {
        true
    }
}

/// Callers whose token carries the `admin` role.
pub struct AdminOnly;

impl RoleConstraint for AdminOnly {
    fn allows(role: &str) -> bool {
        role == "admin"
    }
}

/// Extractor for endpoints that require a bearer access token.
///
/// The token is verified against signature, expiry, issuer and audience.
/// The handler gets the caller as an explicit value.
pub struct Auth<R: RoleConstraint = AnyRole> {
    pub user: AuthenticatedUser,
    _role: PhantomData<R>,
}

impl<S, R> FromRequestParts<S> for Auth<R>
where
    S: HasAuthBackend + Send + Sync,
    R: RoleConstraint,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or(ApiAuthError::new(AuthErrorKind::NotAuthenticated))?;

        let claims = state
            .sessions()
            .verify_access_token(token)
            .map_err(|_| ApiAuthError::new(AuthErrorKind::InvalidToken))?;

        let Some(user_id) = claims.user_id() else {
            debug!("Access token subject is not a user ID");
            return Err(ApiAuthError::new(AuthErrorKind::InvalidToken));
        };

        if !R::allows(&claims.role) {
            debug!(user_id, role = %claims.role, "Role not allowed");
            return Err(ApiAuthError::new(AuthErrorKind::InsufficientRole));
        }

        Ok(Auth {
            user: AuthenticatedUser { user_id, claims },
            _role: PhantomData,
        })
    }
}
