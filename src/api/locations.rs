//! Read-only geographic catalog: regions, their cities, and their communes.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use super::error::{ApiError, ResultExt, parse_id};
use crate::db::{City, Commune, Database, Region};

#[derive(Clone)]
pub struct LocationsState {
    pub db: Database,
}

pub fn router(state: LocationsState) -> Router {
    Router::new()
        .route("/regions", get(list_regions))
        .route("/regions/{id}/cities", get(list_cities))
        .route("/cities/{id}/communes", get(list_communes))
        .with_state(state)
}

async fn list_regions(State(state): State<LocationsState>) -> Result<Json<Vec<Region>>, ApiError> {
    let regions = state
        .db
        .locations()
        .list_regions()
        .await
        .db_err("Failed to list regions")?;
    Ok(Json(regions))
}

async fn list_cities(
    State(state): State<LocationsState>,
    Path(region_id): Path<String>,
) -> Result<Json<Vec<City>>, ApiError> {
    let region_id = parse_id(&region_id)?;
    let cities = state
        .db
        .locations()
        .list_cities(region_id)
        .await
        .db_err("Failed to list cities")?;
    Ok(Json(cities))
}

async fn list_communes(
    State(state): State<LocationsState>,
    Path(city_id): Path<String>,
) -> Result<Json<Vec<Commune>>, ApiError> {
    let city_id = parse_id(&city_id)?;
    let communes = state
        .db
        .locations()
        .list_communes(city_id)
        .await
        .db_err("Failed to list communes")?;
    Ok(Json(communes))
}
