use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    ReadyForPickup,
    PickedUp,
    InTransit,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Position on the forward chain. `Cancelled` sits outside it.
    pub fn rank(self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Confirmed => Some(1),
            OrderStatus::Preparing => Some(2),
            OrderStatus::ReadyForPickup => Some(3),
            OrderStatus::PickedUp => Some(4),
            OrderStatus::InTransit => Some(5),
            OrderStatus::Delivered => Some(6),
            OrderStatus::Cancelled => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Statuses in which an order may still be claimed into a batch.
    pub fn is_pre_dispatch(self) -> bool {
        matches!(
            self,
            OrderStatus::Confirmed | OrderStatus::Preparing | OrderStatus::ReadyForPickup
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusStamp {
    pub status: OrderStatus,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub zone_id: String,
    pub scheduled: bool,
    pub scheduled_date: NaiveDate,
    pub total: f64,
    pub delivery_fee: f64,
    /// Weak back-reference; the batch owns the claim, not the order.
    pub batch_id: Option<Uuid>,
    pub is_ready_for_pickup: bool,
    pub status: OrderStatus,
    pub status_log: Vec<StatusStamp>,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}
