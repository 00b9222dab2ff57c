use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{patch, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::DispatchError;
use crate::models::driver::{Driver, VehicleType};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(create_driver).get(list_drivers))
        .route("/drivers/:id/availability", patch(update_availability))
}

#[derive(Deserialize)]
pub struct CreateDriverRequest {
    pub name: String,
    pub vehicle_type: VehicleType,
    pub rating: f64,
}

#[derive(Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub is_available: Option<bool>,
    pub is_active: Option<bool>,
}

async fn create_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateDriverRequest>,
) -> Result<Json<Driver>, DispatchError> {
    if payload.name.trim().is_empty() {
        return Err(DispatchError::BadRequest("name cannot be empty".to_string()));
    }

    let driver = Driver {
        id: Uuid::new_v4(),
        name: payload.name,
        is_available: true,
        is_active: true,
        vehicle_type: payload.vehicle_type,
        rating: payload.rating.clamp(0.0, 5.0),
    };

    state.drivers.insert(driver.id, driver.clone());
    Ok(Json(driver))
}

async fn list_drivers(State(state): State<Arc<AppState>>) -> Json<Vec<Driver>> {
    let drivers = state
        .drivers
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(drivers)
}

async fn update_availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAvailabilityRequest>,
) -> Result<Json<Driver>, DispatchError> {
    let mut driver = state
        .drivers
        .get_mut(&id)
        .ok_or_else(|| DispatchError::NotFound(format!("driver {id} not found")))?;

    if let Some(is_available) = payload.is_available {
        driver.is_available = is_available;
    }
    if let Some(is_active) = payload.is_active {
        driver.is_active = is_active;
    }

    Ok(Json(driver.clone()))
}
