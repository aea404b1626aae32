use crate::jwt::AccessClaims;

/// Caller identity taken from a verified access token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub claims: AccessClaims,
}
