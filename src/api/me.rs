//! Profile of the authenticated caller.

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use super::addresses::AddressResponse;
use super::error::{ApiError, ResultExt};
use crate::auth::Auth;
use crate::clock::format_timestamp;
use crate::db::Database;
use crate::impl_has_auth_backend;
use crate::session::SessionManager;

#[derive(Clone)]
pub struct MeState {
    pub db: Database,
    pub sessions: SessionManager,
}

impl_has_auth_backend!(MeState);

pub fn router(state: MeState) -> Router {
    Router::new().route("/", get(me)).with_state(state)
}

#[derive(Serialize)]
struct MeResponse {
    id: i64,
    username: String,
    role: String,
    is_active: bool,
    issuer: String,
    audience: Vec<String>,
    expires_at: String,
    addresses: Vec<AddressResponse>,
}

async fn me(State(state): State<MeState>, auth: Auth) -> Result<Json<MeResponse>, ApiError> {
    let user = state
        .db
        .users()
        .get_by_id(auth.user.user_id)
        .await
        .db_err("Failed to load user")?
        .ok_or_else(|| ApiError::unauthorized("Unauthorized"))?;

    let addresses = state
        .db
        .addresses()
        .list_for_user(user.id)
        .await
        .db_err("Failed to list addresses")?;

    let claims = auth.user.claims;
    Ok(Json(MeResponse {
        id: user.id,
        username: user.username,
        role: user.role,
        is_active: user.is_active,
        issuer: claims.iss,
        audience: claims.aud,
        expires_at: format_timestamp(claims.exp),
        addresses: addresses.into_iter().map(AddressResponse::from).collect(),
    }))
}
