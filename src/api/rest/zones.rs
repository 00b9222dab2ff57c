use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::error::DispatchError;
use crate::models::zone::DeliveryZone;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/zones", post(create_zone).get(list_zones))
        .route("/zones/lookup", get(lookup_zone))
}

#[derive(Deserialize)]
pub struct CreateZoneRequest {
    pub id: String,
    pub name: String,
    pub cities: Vec<String>,
    pub base_fee: f64,
    pub transit_days: u8,
}

#[derive(Deserialize)]
pub struct LookupQuery {
    pub city: String,
}

async fn create_zone(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateZoneRequest>,
) -> Result<Json<DeliveryZone>, DispatchError> {
    if payload.id.trim().is_empty() {
        return Err(DispatchError::BadRequest("zone id cannot be empty".to_string()));
    }
    if payload.cities.is_empty() {
        return Err(DispatchError::BadRequest(
            "zone must cover at least one city".to_string(),
        ));
    }

    let zone = DeliveryZone {
        id: payload.id,
        name: payload.name,
        cities: payload.cities,
        base_fee: payload.base_fee,
        transit_days: payload.transit_days,
    };

    state.zones.insert(zone.id.clone(), zone.clone());
    Ok(Json(zone))
}

async fn list_zones(State(state): State<Arc<AppState>>) -> Json<Vec<DeliveryZone>> {
    let zones = state
        .zones
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(zones)
}

async fn lookup_zone(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LookupQuery>,
) -> Result<Json<DeliveryZone>, DispatchError> {
    let zone = state
        .zones
        .iter()
        .find(|entry| entry.value().covers_city(&query.city))
        .map(|entry| entry.value().clone())
        .ok_or_else(|| DispatchError::NotFound(format!("no zone covers {}", query.city)))?;

    Ok(Json(zone))
}
