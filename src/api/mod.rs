mod addresses;
mod auth;
mod error;
mod locations;
mod me;

use axum::Router;

use crate::accounts::AccountService;
use crate::db::Database;
use crate::session::SessionManager;

pub use error::{ApiError, ResultExt};

/// Create the API router (mounted under `/api/v1`).
pub fn create_api_router(
    db: Database,
    accounts: AccountService,
    sessions: SessionManager,
) -> Router {
    let auth_state = auth::AuthState {
        accounts,
        sessions: sessions.clone(),
    };

    let me_state = me::MeState {
        db: db.clone(),
        sessions: sessions.clone(),
    };

    let addresses_state = addresses::AddressesState {
        db: db.clone(),
        sessions,
    };

    let locations_state = locations::LocationsState { db };

    Router::new()
        .nest("/auth", auth::router(auth_state))
        .nest("/me", me::router(me_state))
        .nest("/addresses", addresses::router(addresses_state))
        .merge(locations::router(locations_state))
}
