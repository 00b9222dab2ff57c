use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::error::DispatchError;
use crate::models::batch::BatchStatus;
use crate::models::order::{Order, OrderStatus, StatusStamp};
use crate::notify::{publish, DispatchEvent};
use crate::state::AppState;

/// Applies one status change to an order in place. Pure with respect to
/// shared state; the caller holds the entry lock. Returns whether
/// anything changed: re-requesting the current status is a no-op.
pub(crate) fn apply(
    order: &mut Order,
    target: OrderStatus,
    batch_status: Option<BatchStatus>,
    reason: Option<String>,
    now: DateTime<Utc>,
) -> Result<bool, DispatchError> {
    if order.status == target {
        return Ok(false);
    }

    if target == OrderStatus::Cancelled {
        if order.status == OrderStatus::Delivered {
            return Err(DispatchError::invalid_transition(order.status, target));
        }
        let reason = reason.ok_or_else(|| {
            DispatchError::BadRequest("order cancellation requires a reason".to_string())
        })?;

        order.status = OrderStatus::Cancelled;
        order.cancel_reason = Some(reason);
        order.status_log.push(StatusStamp { status: target, at: now });
        return Ok(true);
    }

    let (Some(from), Some(to)) = (order.status.rank(), target.rank()) else {
        return Err(DispatchError::invalid_transition(order.status, target));
    };

    // one step forward at a time; anything else is illegal
    if to != from + 1 {
        return Err(DispatchError::invalid_transition(order.status, target));
    }

    // picked_up and later must stay consistent with the owning batch
    match target {
        OrderStatus::PickedUp => {
            if !matches!(
                batch_status,
                Some(BatchStatus::Assigned | BatchStatus::InTransit)
            ) {
                return Err(DispatchError::invalid_transition(order.status, target));
            }
        }
        OrderStatus::InTransit => {
            if batch_status != Some(BatchStatus::InTransit) {
                return Err(DispatchError::invalid_transition(order.status, target));
            }
        }
        _ => {}
    }

    order.status = target;
    if target == OrderStatus::ReadyForPickup {
        order.is_ready_for_pickup = true;
    }
    order.status_log.push(StatusStamp { status: target, at: now });

    Ok(true)
}

/// Advances an order, resolving its batch status for the consistency
/// guard. This is the entry point for callers outside BatchLifecycle.
pub fn advance_order(
    state: &AppState,
    order_id: Uuid,
    target: OrderStatus,
    reason: Option<String>,
) -> Result<Order, DispatchError> {
    let batch_id = state
        .orders
        .get(&order_id)
        .ok_or_else(|| DispatchError::NotFound(format!("order {order_id} not found")))?
        .batch_id;
    let batch_status = batch_id.and_then(|id| state.batches.get(&id).map(|b| b.status));

    advance_with_batch(state, order_id, target, batch_status, reason)
}

/// Same as [`advance_order`] but with the batch status supplied by the
/// caller, so BatchLifecycle can push members while it already knows
/// (and has just written) the batch's new status.
pub(crate) fn advance_with_batch(
    state: &AppState,
    order_id: Uuid,
    target: OrderStatus,
    batch_status: Option<BatchStatus>,
    reason: Option<String>,
) -> Result<Order, DispatchError> {
    let (changed, snapshot) = {
        let mut order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| DispatchError::NotFound(format!("order {order_id} not found")))?;
        let changed = apply(&mut order, target, batch_status, reason, Utc::now())?;
        (changed, order.clone())
    };

    if changed {
        info!(order_id = %order_id, status = ?target, "order status advanced");
        publish(
            state,
            DispatchEvent::OrderStatusChanged {
                order_id,
                status: target,
            },
        );
    }

    Ok(snapshot)
}
