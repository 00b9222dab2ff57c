use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::handoff;
use crate::engine::status::advance_order;
use crate::error::DispatchError;
use crate::models::order::{Order, OrderStatus};
use crate::models::verification::{HandoffKind, VerificationCode};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/status", post(update_status))
        .route("/orders/:id/codes/:kind", post(issue_code))
        .route("/orders/:id/codes/:kind/validate", post(validate_code))
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub zone_id: String,
    pub scheduled_date: NaiveDate,
    pub total: f64,
    /// Defaults to the zone's base fee.
    pub delivery_fee: Option<f64>,
    pub scheduled: Option<bool>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct ValidateCodeRequest {
    pub code: String,
}

pub(crate) fn parse_kind(raw: &str) -> Result<HandoffKind, DispatchError> {
    match raw {
        "pickup" => Ok(HandoffKind::Pickup),
        "delivery" => Ok(HandoffKind::Delivery),
        other => Err(DispatchError::BadRequest(format!(
            "unknown handoff kind: {other}"
        ))),
    }
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<Order>, DispatchError> {
    let base_fee = state
        .zones
        .get(&payload.zone_id)
        .map(|z| z.base_fee)
        .ok_or_else(|| DispatchError::NotFound(format!("zone {} not found", payload.zone_id)))?;

    let order = Order {
        id: Uuid::new_v4(),
        zone_id: payload.zone_id,
        scheduled: payload.scheduled.unwrap_or(true),
        scheduled_date: payload.scheduled_date,
        total: payload.total,
        delivery_fee: payload.delivery_fee.unwrap_or(base_fee),
        batch_id: None,
        is_ready_for_pickup: false,
        status: OrderStatus::Pending,
        status_log: Vec::new(),
        cancel_reason: None,
        created_at: Utc::now(),
    };

    state.orders.insert(order.id, order.clone());
    Ok(Json(order))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, DispatchError> {
    let order = state
        .orders
        .get(&id)
        .ok_or_else(|| DispatchError::NotFound(format!("order {id} not found")))?;

    Ok(Json(order.value().clone()))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Order>, DispatchError> {
    let order = advance_order(&state, id, payload.status, payload.reason)?;
    Ok(Json(order))
}

async fn issue_code(
    State(state): State<Arc<AppState>>,
    Path((id, kind)): Path<(Uuid, String)>,
) -> Result<Json<VerificationCode>, DispatchError> {
    let kind = parse_kind(&kind)?;
    let code = handoff::issue_code(&state, id, kind)?;
    Ok(Json(code))
}

async fn validate_code(
    State(state): State<Arc<AppState>>,
    Path((id, kind)): Path<(Uuid, String)>,
    Json(payload): Json<ValidateCodeRequest>,
) -> Result<Json<Order>, DispatchError> {
    let kind = parse_kind(&kind)?;
    let order = handoff::validate_code(&state, id, kind, &payload.code)?;
    Ok(Json(order))
}
