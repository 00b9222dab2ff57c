use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post};
use axum::Json;
use axum::Router;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::assignment::AssignmentConfirmation;
use crate::engine::claims::{self, ClaimReport};
use crate::engine::lifecycle;
use crate::error::DispatchError;
use crate::models::batch::DeliveryBatch;
use crate::models::order::Order;
use crate::models::verification::{HandoffKind, VerificationCode};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/batches", post(create_batch).get(list_batches))
        .route("/batches/eligible", get(eligible_orders))
        .route("/batches/:id", get(get_batch))
        .route("/batches/:id/claim", post(claim))
        .route("/batches/:id/ready", post(mark_ready))
        .route("/batches/:id/assign", post(assign_driver))
        .route("/batches/:id/reassign", post(reassign_driver))
        .route("/batches/:id/depart", post(depart))
        .route("/batches/:id/complete", post(complete))
        .route("/batches/:id/cancel", post(cancel))
        .route("/batches/:id/orders/:order_id", delete(remove_order))
        .route("/batches/:id/codes", get(list_codes))
}

#[derive(Deserialize)]
pub struct EligibleQuery {
    pub zone_id: String,
    pub date: NaiveDate,
}

#[derive(Deserialize)]
pub struct CreateBatchRequest {
    pub zone_id: String,
    pub scheduled_date: NaiveDate,
    #[serde(default)]
    pub order_ids: Vec<Uuid>,
}

#[derive(Deserialize)]
pub struct ClaimRequest {
    pub order_ids: Vec<Uuid>,
}

#[derive(Deserialize)]
pub struct AssignRequest {
    pub driver_id: Uuid,
}

#[derive(Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct CreateBatchResponse {
    pub batch: DeliveryBatch,
    pub claim: ClaimReport,
}

#[derive(Serialize)]
pub struct AssignResponse {
    pub batch: DeliveryBatch,
    pub confirmation: AssignmentConfirmation,
}

async fn eligible_orders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EligibleQuery>,
) -> Json<Vec<Order>> {
    Json(claims::eligible_orders(&state, &query.zone_id, query.date))
}

async fn create_batch(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateBatchRequest>,
) -> Result<Json<CreateBatchResponse>, DispatchError> {
    let (batch, claim) = lifecycle::create_batch(
        &state,
        &payload.zone_id,
        payload.scheduled_date,
        &payload.order_ids,
    )?;

    Ok(Json(CreateBatchResponse { batch, claim }))
}

async fn list_batches(State(state): State<Arc<AppState>>) -> Json<Vec<DeliveryBatch>> {
    let batches = state
        .batches
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(batches)
}

async fn get_batch(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryBatch>, DispatchError> {
    let batch = state
        .batches
        .get(&id)
        .ok_or_else(|| DispatchError::NotFound(format!("batch {id} not found")))?;

    Ok(Json(batch.value().clone()))
}

async fn claim(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ClaimRequest>,
) -> Result<Json<ClaimReport>, DispatchError> {
    let report = claims::claim_orders(&state, id, &payload.order_ids)?;
    Ok(Json(report))
}

async fn mark_ready(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryBatch>, DispatchError> {
    Ok(Json(lifecycle::mark_ready(&state, id)?))
}

async fn assign_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignRequest>,
) -> Result<Json<AssignResponse>, DispatchError> {
    let (batch, confirmation) = lifecycle::assign_driver(&state, id, payload.driver_id)?;
    Ok(Json(AssignResponse {
        batch,
        confirmation,
    }))
}

async fn reassign_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignRequest>,
) -> Result<Json<AssignResponse>, DispatchError> {
    let (batch, confirmation) = lifecycle::reassign_driver(&state, id, payload.driver_id)?;
    Ok(Json(AssignResponse {
        batch,
        confirmation,
    }))
}

async fn depart(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryBatch>, DispatchError> {
    Ok(Json(lifecycle::start_transit(&state, id)?))
}

async fn complete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryBatch>, DispatchError> {
    Ok(Json(lifecycle::complete(&state, id)?))
}

async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelRequest>,
) -> Result<Json<DeliveryBatch>, DispatchError> {
    Ok(Json(lifecycle::cancel(&state, id, payload.reason)?))
}

async fn remove_order(
    State(state): State<Arc<AppState>>,
    Path((id, order_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<DeliveryBatch>, DispatchError> {
    Ok(Json(lifecycle::remove_order(&state, id, order_id)?))
}

async fn list_codes(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<VerificationCode>>, DispatchError> {
    let member_ids = state
        .batches
        .get(&id)
        .ok_or_else(|| DispatchError::NotFound(format!("batch {id} not found")))?
        .order_ids
        .clone();

    let mut codes = Vec::new();
    for order_id in member_ids {
        for kind in [HandoffKind::Pickup, HandoffKind::Delivery] {
            if let Some(code) = state.codes.get(&(order_id, kind)) {
                codes.push(code.value().clone());
            }
        }
    }

    Ok(Json(codes))
}
