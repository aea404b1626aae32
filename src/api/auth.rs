//! Authentication and session API endpoints.
//!
//! - POST `/login` - Check credentials and open a session
//! - POST `/refresh` - Rotate a refresh token into a new pair
//! - POST `/logout` - Revoke one refresh token (always 204)
//! - POST `/register` - Create an account (admin only)
//! - POST `/logout-all` - Revoke every session of the caller
//! - GET `/sessions` - List the caller's active sessions

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::ApiError;
use crate::accounts::AccountService;
use crate::auth::{AdminOnly, Auth};
use crate::clock::format_timestamp;
use crate::db::User;
use crate::error::AuthError;
use crate::impl_has_auth_backend;
use crate::session::{SessionManager, TokenPair};

#[derive(Clone)]
pub struct AuthState {
    pub accounts: AccountService,
    pub sessions: SessionManager,
}

impl_has_auth_backend!(AuthState);

pub fn router(state: AuthState) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/register", post(register))
        .route("/logout-all", post(logout_all))
        .route("/sessions", get(list_sessions))
        .with_state(state)
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
struct RefreshRequest {
    #[serde(default)]
    refresh_token: String,
}

#[derive(Deserialize)]
struct RegisterRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    role: String,
}

#[derive(Serialize)]
struct TokenResponse {
    access_token: String,
    token_type: &'static str,
    expires_in: i64,
    expires_at: String,
    refresh_token: String,
    refresh_expires_at: String,
    role: String,
    username: String,
}

impl TokenResponse {
    fn new(pair: TokenPair, user: &User, expires_in: i64) -> Self {
        Self {
            access_token: pair.access_token,
            token_type: "Bearer",
            expires_in,
            expires_at: format_timestamp(pair.access_expires_at),
            refresh_token: pair.refresh_token,
            refresh_expires_at: format_timestamp(pair.refresh_expires_at),
            role: user.role.clone(),
            username: user.username.clone(),
        }
    }
}

#[derive(Serialize)]
struct RegisterResponse {
    id: i64,
    username: String,
    role: String,
}

#[derive(Serialize)]
struct LogoutAllResponse {
    revoked: u64,
}

#[derive(Serialize)]
struct SessionResponse {
    id: i64,
    created_at: String,
    expires_at: String,
}

#[derive(Serialize)]
struct ListSessionsResponse {
    count: usize,
    sessions: Vec<SessionResponse>,
}

async fn login(
    State(state): State<AuthState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = state.accounts.verify_login(&req.username, &req.password).await?;
    let pair = state.sessions.issue_for_user(&user).await?;

    info!(user_id = user.id, "User logged in");
    let expires_in = state.sessions.jwt().access_ttl_secs();
    Ok(Json(TokenResponse::new(pair, &user, expires_in)))
}

async fn refresh(
    State(state): State<AuthState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let presented = req.refresh_token.as_str();
    if presented.trim().is_empty() {
        return Err(ApiError::bad_request("refresh_token is required"));
    }

    let (pair, user) = state.sessions.rotate(presented).await?;

    let expires_in = state.sessions.jwt().access_ttl_secs();
    Ok(Json(TokenResponse::new(pair, &user, expires_in)))
}

/// Succeeds whether or not the token was live, so the response never
/// confirms that a token existed.
async fn logout(
    State(state): State<AuthState>,
    Json(req): Json<RefreshRequest>,
) -> Result<StatusCode, ApiError> {
    let presented = req.refresh_token.as_str();
    if presented.trim().is_empty() {
        return Err(ApiError::bad_request("refresh_token is required"));
    }

    match state.sessions.revoke(presented).await {
        Ok(()) | Err(AuthError::InvalidRefreshToken) => Ok(StatusCode::NO_CONTENT),
        Err(e) => Err(e.into()),
    }
}

async fn register(
    State(state): State<AuthState>,
    _auth: Auth<AdminOnly>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = state
        .accounts
        .register(&req.username, &req.password, &req.role)
        .await?;

    let user = state
        .accounts
        .get(id)
        .await?
        .ok_or_else(|| ApiError::internal("Internal server error"))?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: user.id,
            username: user.username,
            role: user.role,
        }),
    ))
}

async fn logout_all(
    State(state): State<AuthState>,
    auth: Auth,
) -> Result<Json<LogoutAllResponse>, ApiError> {
    let revoked = state
        .sessions
        .revoke_all_for_user(auth.user.user_id)
        .await?;
    Ok(Json(LogoutAllResponse { revoked }))
}

async fn list_sessions(
    State(state): State<AuthState>,
    auth: Auth,
) -> Result<Json<ListSessionsResponse>, ApiError> {
    let sessions: Vec<SessionResponse> = state
        .sessions
        .list_active_sessions(auth.user.user_id)
        .await?
        .into_iter()
        .map(|s| SessionResponse {
            id: s.id,
            created_at: format_timestamp(s.created_at),
            expires_at: format_timestamp(s.expires_at),
        })
        .collect();

    Ok(Json(ListSessionsResponse {
        count: sessions.len(),
        sessions,
    }))
}
