use serde::Serialize;
use uuid::Uuid;

use crate::models::order::OrderStatus;
use crate::models::verification::HandoffKind;
use crate::state::AppState;

/// Events published after a state change commits. Delivery is
/// fire-and-forget: a notification that reaches nobody never rolls
/// back the transition that produced it.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DispatchEvent {
    BatchCreated {
        batch_id: Uuid,
        batch_number: String,
        zone_id: String,
    },
    BatchReady {
        batch_id: Uuid,
    },
    DriverAssigned {
        batch_id: Uuid,
        driver_id: Uuid,
    },
    BatchDeparted {
        batch_id: Uuid,
    },
    BatchCompleted {
        batch_id: Uuid,
    },
    BatchCancelled {
        batch_id: Uuid,
        reason: Option<String>,
    },
    OrderStatusChanged {
        order_id: Uuid,
        status: OrderStatus,
    },
    HandoffValidated {
        order_id: Uuid,
        kind: HandoffKind,
    },
}

pub fn publish(state: &AppState, event: DispatchEvent) {
    // send only fails when there are no subscribers, which is fine
    let _ = state.events_tx.send(event);
}
