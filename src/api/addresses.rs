//! Address API endpoints. Every route acts on the caller's own addresses.
//!
//! - GET `/` - List addresses, newest first
//! - POST `/` - Create an address
//! - PATCH `/{id}` - Partially update an address
//! - DELETE `/{id}` - Delete an address

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::{ApiError, ResultExt, parse_id};
use crate::auth::Auth;
use crate::clock::format_timestamp;
use crate::db::{AddressPatch, AddressView, Database, NewAddress, is_foreign_key_violation};
use crate::impl_has_auth_backend;
use crate::session::SessionManager;

#[derive(Clone)]
pub struct AddressesState {
    pub db: Database,
    pub sessions: SessionManager,
}

impl_has_auth_backend!(AddressesState);

pub fn router(state: AddressesState) -> Router {
    Router::new()
        .route("/", get(list_addresses).post(create_address))
        .route("/{id}", patch(update_address).delete(delete_address))
        .with_state(state)
}

#[derive(Serialize)]
pub(super) struct RefResponse {
    id: i64,
    name: String,
}

#[derive(Serialize)]
pub(super) struct RegionRefResponse {
    id: i64,
    name: String,
    code: String,
}

#[derive(Serialize)]
pub(super) struct AddressResponse {
    id: i64,
    street: String,
    number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    apartment: Option<String>,
    commune: RefResponse,
    city: RefResponse,
    region: RegionRefResponse,
    created_at: String,
    updated_at: String,
}

impl From<AddressView> for AddressResponse {
    fn from(view: AddressView) -> Self {
        Self {
            id: view.id,
            street: view.street,
            number: view.number,
            apartment: view.apartment,
            commune: RefResponse {
                id: view.commune.id,
                name: view.commune.name,
            },
            city: RefResponse {
                id: view.city.id,
                name: view.city.name,
            },
            region: RegionRefResponse {
                id: view.region.id,
                name: view.region.name,
                code: view.region.code,
            },
            created_at: format_timestamp(view.created_at),
            updated_at: format_timestamp(view.updated_at),
        }
    }
}

#[derive(Deserialize)]
struct CreateAddressRequest {
    #[serde(default)]
    commune_id: i64,
    #[serde(default)]
    street: String,
    #[serde(default)]
    number: String,
    apartment: Option<String>,
}

#[derive(Deserialize)]
struct UpdateAddressRequest {
    commune_id: Option<i64>,
    street: Option<String>,
    number: Option<String>,
    apartment: Option<String>,
}

/// Trim an optional field, mapping blank to `None`.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_new(req: CreateAddressRequest) -> Result<NewAddress, ApiError> {
    let street = req.street.trim();
    let number = req.number.trim();
    if req.commune_id <= 0 || street.is_empty() || number.is_empty() {
        return Err(ApiError::bad_request(
            "commune_id, street and number are required",
        ));
    }
    Ok(NewAddress {
        commune_id: req.commune_id,
        street: street.to_string(),
        number: number.to_string(),
        apartment: non_blank(req.apartment),
    })
}

fn validate_patch(req: UpdateAddressRequest) -> Result<AddressPatch, ApiError> {
    if matches!(req.commune_id, Some(id) if id <= 0) {
        return Err(ApiError::bad_request("Invalid commune_id"));
    }

    let mut patch = AddressPatch {
        commune_id: req.commune_id,
        ..Default::default()
    };

    if let Some(street) = req.street {
        let street = street.trim();
        if street.is_empty() {
            return Err(ApiError::bad_request("street cannot be empty"));
        }
        patch.street = Some(street.to_string());
    }

    if let Some(number) = req.number {
        let number = number.trim();
        if number.is_empty() {
            return Err(ApiError::bad_request("number cannot be empty"));
        }
        patch.number = Some(number.to_string());
    }

    // Present but blank clears the apartment.
    if req.apartment.is_some() {
        patch.apartment = Some(non_blank(req.apartment));
    }

    if patch.is_empty() {
        return Err(ApiError::bad_request("Nothing to update"));
    }
    Ok(patch)
}

fn map_write_error(context: &str, e: sqlx::Error) -> ApiError {
    if is_foreign_key_violation(&e) {
        ApiError::bad_request("Unknown commune")
    } else {
        ApiError::db_error(context, e)
    }
}

async fn list_addresses(
    State(state): State<AddressesState>,
    auth: Auth,
) -> Result<Json<Vec<AddressResponse>>, ApiError> {
    let addresses = state
        .db
        .addresses()
        .list_for_user(auth.user.user_id)
        .await
        .db_err("Failed to list addresses")?;

    Ok(Json(addresses.into_iter().map(AddressResponse::from).collect()))
}

async fn create_address(
    State(state): State<AddressesState>,
    auth: Auth,
    Json(req): Json<CreateAddressRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth.user.user_id;
    let address = validate_new(req)?;

    let id = state
        .db
        .addresses()
        .create_for_user(user_id, &address)
        .await
        .map_err(|e| map_write_error("Failed to create address", e))?;

    let view = state
        .db
        .addresses()
        .get_view_for_user(user_id, id)
        .await
        .db_err("Failed to load address")?
        .ok_or_else(|| ApiError::not_found("Address not found"))?;

    info!(user_id, address_id = id, "Created address");
    Ok((StatusCode::CREATED, Json(AddressResponse::from(view))))
}

async fn update_address(
    State(state): State<AddressesState>,
    auth: Auth,
    Path(id): Path<String>,
    Json(req): Json<UpdateAddressRequest>,
) -> Result<Json<AddressResponse>, ApiError> {
    let user_id = auth.user.user_id;
    let id = parse_id(&id)?;
    let patch = validate_patch(req)?;

    let updated = state
        .db
        .addresses()
        .update_for_user(user_id, id, &patch)
        .await
        .map_err(|e| map_write_error("Failed to update address", e))?;
    if !updated {
        return Err(ApiError::not_found("Address not found"));
    }

    let view = state
        .db
        .addresses()
        .get_view_for_user(user_id, id)
        .await
        .db_err("Failed to load address")?
        .ok_or_else(|| ApiError::not_found("Address not found"))?;

    Ok(Json(AddressResponse::from(view)))
}

async fn delete_address(
    State(state): State<AddressesState>,
    auth: Auth,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let user_id = auth.user.user_id;
    let id = parse_id(&id)?;

    let deleted = state
        .db
        .addresses()
        .delete_for_user(user_id, id)
        .await
        .db_err("Failed to delete address")?;
    if !deleted {
        return Err(ApiError::not_found("Address not found"));
    }

    info!(user_id, address_id = id, "Deleted address");
    Ok(StatusCode::NO_CONTENT)
}
