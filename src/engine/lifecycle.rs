use chrono::{NaiveDate, Utc};
use tracing::info;
use uuid::Uuid;

use crate::engine::assignment::{confirm_driver, AssignmentConfirmation};
use crate::engine::claims::{claim_orders, release_orders, ClaimReport};
use crate::engine::status::advance_with_batch;
use crate::error::DispatchError;
use crate::models::batch::{BatchStatus, DeliveryBatch};
use crate::models::order::OrderStatus;
use crate::models::verification::HandoffKind;
use crate::notify::{publish, DispatchEvent};
use crate::state::AppState;

/// The sole authority on legal batch transitions. Exhaustive on
/// purpose: a new status forces every arm to be reconsidered.
pub fn transition_allowed(from: BatchStatus, to: BatchStatus) -> bool {
    use BatchStatus::*;

    match (from, to) {
        (Collecting, Ready)
        | (Ready, Assigned)
        | (Assigned, InTransit)
        | (InTransit, Completed) => true,
        (from, Cancelled) => !from.is_terminal(),
        _ => false,
    }
}

fn transition_label(to: BatchStatus) -> &'static str {
    match to {
        BatchStatus::Collecting => "collecting",
        BatchStatus::Ready => "ready",
        BatchStatus::Assigned => "assigned",
        BatchStatus::InTransit => "in_transit",
        BatchStatus::Completed => "completed",
        BatchStatus::Cancelled => "cancelled",
    }
}

/// Creates a batch in `Collecting` and claims the initial selection.
/// The claim result may be partial; the batch is created either way.
pub fn create_batch(
    state: &AppState,
    zone_id: &str,
    scheduled_date: NaiveDate,
    initial_order_ids: &[Uuid],
) -> Result<(DeliveryBatch, ClaimReport), DispatchError> {
    if !state.zones.contains_key(zone_id) {
        return Err(DispatchError::NotFound(format!("zone {zone_id} not found")));
    }

    let batch = DeliveryBatch {
        id: Uuid::new_v4(),
        batch_number: state.next_batch_number(zone_id, scheduled_date),
        zone_id: zone_id.to_string(),
        scheduled_date,
        status: BatchStatus::Collecting,
        order_ids: Vec::new(),
        driver_id: None,
        created_at: Utc::now(),
        assigned_at: None,
        started_at: None,
        completed_at: None,
        cancelled_at: None,
        cancel_reason: None,
    };

    let batch_id = batch.id;
    state.batches.insert(batch_id, batch);
    state.metrics.active_batches.inc();

    let report = claim_orders(state, batch_id, initial_order_ids)?;
    let snapshot = state
        .batches
        .get(&batch_id)
        .map(|b| b.value().clone())
        .ok_or_else(|| DispatchError::Internal("batch vanished during creation".to_string()))?;

    info!(
        batch_id = %batch_id,
        batch_number = %snapshot.batch_number,
        zone_id = %zone_id,
        members = snapshot.order_ids.len(),
        "batch created"
    );
    publish(
        state,
        DispatchEvent::BatchCreated {
            batch_id,
            batch_number: snapshot.batch_number.clone(),
            zone_id: zone_id.to_string(),
        },
    );

    Ok((snapshot, report))
}

/// Collecting → Ready. Requires at least one member order.
pub fn mark_ready(state: &AppState, batch_id: Uuid) -> Result<DeliveryBatch, DispatchError> {
    let snapshot = {
        let mut batch = get_batch_mut(state, batch_id)?;
        if !transition_allowed(batch.status, BatchStatus::Ready) {
            return Err(DispatchError::invalid_transition(
                batch.status,
                BatchStatus::Ready,
            ));
        }
        if batch.order_ids.is_empty() {
            return Err(DispatchError::EmptyBatch);
        }

        batch.status = BatchStatus::Ready;
        batch.clone()
    };

    record_transition(state, BatchStatus::Ready);
    info!(batch_id = %batch_id, "batch ready");
    publish(state, DispatchEvent::BatchReady { batch_id });

    Ok(snapshot)
}

/// Ready → Assigned. Driver validation is delegated to
/// DriverAssignmentService before the batch is touched.
pub fn assign_driver(
    state: &AppState,
    batch_id: Uuid,
    driver_id: Uuid,
) -> Result<(DeliveryBatch, AssignmentConfirmation), DispatchError> {
    let confirmation = confirm_driver(state, driver_id)?;

    let snapshot = {
        let mut batch = get_batch_mut(state, batch_id)?;
        if !transition_allowed(batch.status, BatchStatus::Assigned) {
            return Err(DispatchError::invalid_transition(
                batch.status,
                BatchStatus::Assigned,
            ));
        }

        batch.status = BatchStatus::Assigned;
        batch.driver_id = Some(driver_id);
        batch.assigned_at = Some(Utc::now());
        batch.clone()
    };

    record_transition(state, BatchStatus::Assigned);
    info!(batch_id = %batch_id, driver_id = %driver_id, "driver assigned");
    publish(state, DispatchEvent::DriverAssigned { batch_id, driver_id });

    Ok((snapshot, confirmation))
}

/// Swaps the driver while the batch is still `Assigned`. Once the batch
/// is in transit somebody is already en route, so it is too late.
pub fn reassign_driver(
    state: &AppState,
    batch_id: Uuid,
    driver_id: Uuid,
) -> Result<(DeliveryBatch, AssignmentConfirmation), DispatchError> {
    let confirmation = confirm_driver(state, driver_id)?;

    let snapshot = {
        let mut batch = get_batch_mut(state, batch_id)?;
        if batch.status != BatchStatus::Assigned {
            return Err(DispatchError::InvalidTransition {
                from: format!("{:?}", batch.status),
                to: "reassign".to_string(),
            });
        }

        batch.driver_id = Some(driver_id);
        batch.assigned_at = Some(Utc::now());
        batch.clone()
    };

    info!(batch_id = %batch_id, driver_id = %driver_id, "driver reassigned");
    publish(state, DispatchEvent::DriverAssigned { batch_id, driver_id });

    Ok((snapshot, confirmation))
}

/// Assigned → InTransit. Requires every live member to be ready for
/// pickup; pushes members through PickedUp into InTransit.
pub fn start_transit(state: &AppState, batch_id: Uuid) -> Result<DeliveryBatch, DispatchError> {
    let (snapshot, member_ids) = {
        let mut batch = get_batch_mut(state, batch_id)?;
        if !transition_allowed(batch.status, BatchStatus::InTransit) {
            return Err(DispatchError::invalid_transition(
                batch.status,
                BatchStatus::InTransit,
            ));
        }

        for order_id in &batch.order_ids {
            let order = state.orders.get(order_id).ok_or_else(|| {
                DispatchError::Internal(format!("member order {order_id} missing"))
            })?;
            if order.status.is_terminal() {
                continue;
            }
            if !order.is_ready_for_pickup {
                return Err(DispatchError::IncompleteHandoff(format!(
                    "order {order_id} is not ready for pickup"
                )));
            }
        }

        batch.status = BatchStatus::InTransit;
        batch.started_at = Some(Utc::now());
        (batch.clone(), batch.order_ids.clone())
    };

    for order_id in member_ids {
        let current = state
            .orders
            .get(&order_id)
            .map(|o| o.status)
            .ok_or_else(|| DispatchError::Internal(format!("member order {order_id} missing")))?;
        if current.is_terminal() {
            continue;
        }

        advance_with_batch(
            state,
            order_id,
            OrderStatus::PickedUp,
            Some(BatchStatus::InTransit),
            None,
        )?;
        advance_with_batch(
            state,
            order_id,
            OrderStatus::InTransit,
            Some(BatchStatus::InTransit),
            None,
        )?;
    }

    record_transition(state, BatchStatus::InTransit);
    info!(batch_id = %batch_id, "batch departed");
    publish(state, DispatchEvent::BatchDeparted { batch_id });

    Ok(snapshot)
}

/// InTransit → Completed. Requires every member order to be terminal.
pub fn complete(state: &AppState, batch_id: Uuid) -> Result<DeliveryBatch, DispatchError> {
    let snapshot = {
        let mut batch = get_batch_mut(state, batch_id)?;
        if !transition_allowed(batch.status, BatchStatus::Completed) {
            return Err(DispatchError::invalid_transition(
                batch.status,
                BatchStatus::Completed,
            ));
        }

        for order_id in &batch.order_ids {
            let order = state.orders.get(order_id).ok_or_else(|| {
                DispatchError::Internal(format!("member order {order_id} missing"))
            })?;
            if !order.status.is_terminal() {
                return Err(DispatchError::IncompleteHandoff(format!(
                    "order {order_id} has not reached a terminal status"
                )));
            }
        }

        batch.status = BatchStatus::Completed;
        batch.completed_at = Some(Utc::now());
        batch.clone()
    };

    state.metrics.active_batches.dec();
    record_transition(state, BatchStatus::Completed);
    info!(batch_id = %batch_id, "batch completed");
    publish(state, DispatchEvent::BatchCompleted { batch_id });

    Ok(snapshot)
}

/// Any non-terminal state → Cancelled. Releases every member claim so
/// the orders become claimable again, and invalidates any live
/// verification codes minted while they were members.
pub fn cancel(
    state: &AppState,
    batch_id: Uuid,
    reason: Option<String>,
) -> Result<DeliveryBatch, DispatchError> {
    let (snapshot, member_ids) = {
        let mut batch = get_batch_mut(state, batch_id)?;
        if !transition_allowed(batch.status, BatchStatus::Cancelled) {
            return Err(DispatchError::invalid_transition(
                batch.status,
                BatchStatus::Cancelled,
            ));
        }

        batch.status = BatchStatus::Cancelled;
        batch.cancelled_at = Some(Utc::now());
        batch.cancel_reason = reason.clone();
        (batch.clone(), batch.order_ids.clone())
    };

    release_orders(state, batch_id, &member_ids);

    for order_id in &member_ids {
        for kind in [HandoffKind::Pickup, HandoffKind::Delivery] {
            if let Some(mut code) = state.codes.get_mut(&(*order_id, kind)) {
                if code.is_live() {
                    code.superseded = true;
                }
            }
        }
    }

    state.metrics.active_batches.dec();
    record_transition(state, BatchStatus::Cancelled);
    info!(batch_id = %batch_id, members = member_ids.len(), "batch cancelled");
    publish(state, DispatchEvent::BatchCancelled { batch_id, reason });

    Ok(snapshot)
}

/// Drops a single order from a batch that is still collecting. Once the
/// batch has moved on, the whole batch must be cancelled or completed.
pub fn remove_order(
    state: &AppState,
    batch_id: Uuid,
    order_id: Uuid,
) -> Result<DeliveryBatch, DispatchError> {
    let snapshot = {
        let mut batch = get_batch_mut(state, batch_id)?;
        if batch.status != BatchStatus::Collecting {
            return Err(DispatchError::InvalidTransition {
                from: format!("{:?}", batch.status),
                to: "remove_order".to_string(),
            });
        }

        let position = batch
            .order_ids
            .iter()
            .position(|id| *id == order_id)
            .ok_or_else(|| {
                DispatchError::NotFound(format!(
                    "order {order_id} is not a member of batch {batch_id}"
                ))
            })?;
        batch.order_ids.swap_remove(position);
        batch.clone()
    };

    release_orders(state, batch_id, &[order_id]);
    info!(batch_id = %batch_id, order_id = %order_id, "order removed from batch");

    Ok(snapshot)
}

fn get_batch_mut<'a>(
    state: &'a AppState,
    batch_id: Uuid,
) -> Result<dashmap::mapref::one::RefMut<'a, Uuid, DeliveryBatch>, DispatchError> {
    state
        .batches
        .get_mut(&batch_id)
        .ok_or_else(|| DispatchError::NotFound(format!("batch {batch_id} not found")))
}

fn record_transition(state: &AppState, to: BatchStatus) {
    state
        .metrics
        .batch_transitions_total
        .with_label_values(&[transition_label(to)])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::transition_allowed;
    use crate::models::batch::BatchStatus::*;

    #[test]
    fn forward_chain_is_allowed() {
        assert!(transition_allowed(Collecting, Ready));
        assert!(transition_allowed(Ready, Assigned));
        assert!(transition_allowed(Assigned, InTransit));
        assert!(transition_allowed(InTransit, Completed));
    }

    #[test]
    fn skipping_states_is_not() {
        assert!(!transition_allowed(Collecting, Assigned));
        assert!(!transition_allowed(Collecting, InTransit));
        assert!(!transition_allowed(Ready, InTransit));
        assert!(!transition_allowed(Assigned, Completed));
    }

    #[test]
    fn going_backward_is_not() {
        assert!(!transition_allowed(Ready, Collecting));
        assert!(!transition_allowed(InTransit, Assigned));
        assert!(!transition_allowed(Completed, InTransit));
    }

    #[test]
    fn cancel_is_allowed_from_any_non_terminal_state() {
        assert!(transition_allowed(Collecting, Cancelled));
        assert!(transition_allowed(Ready, Cancelled));
        assert!(transition_allowed(Assigned, Cancelled));
        assert!(transition_allowed(InTransit, Cancelled));
        assert!(!transition_allowed(Completed, Cancelled));
        assert!(!transition_allowed(Cancelled, Cancelled));
    }
}
