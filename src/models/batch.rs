use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Collecting,
    Ready,
    Assigned,
    InTransit,
    Completed,
    Cancelled,
}

impl BatchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Cancelled)
    }
}

/// A group of scheduled orders from one zone, for one delivery date,
/// handled together by one driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryBatch {
    pub id: Uuid,
    /// Human-readable, unique and monotonic per zone+date.
    pub batch_number: String,
    pub zone_id: String,
    pub scheduled_date: NaiveDate,
    pub status: BatchStatus,
    /// Membership is a set; insertion order carries no meaning.
    pub order_ids: Vec<Uuid>,
    pub driver_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    /// `None` means the operator gave no reason at all; `Some("")` means
    /// an explicitly empty one.
    pub cancel_reason: Option<String>,
}
