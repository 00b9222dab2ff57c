use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffKind {
    Pickup,
    Delivery,
}

/// Single-use proof of a custody transfer, owned by its order.
/// At most one live code exists per (order, kind).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationCode {
    pub order_id: Uuid,
    pub kind: HandoffKind,
    pub otp: String,
    pub qr_token: String,
    pub issued_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub superseded: bool,
}

impl VerificationCode {
    pub fn is_live(&self) -> bool {
        self.consumed_at.is_none() && !self.superseded
    }
}
