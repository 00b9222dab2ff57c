use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    Bicycle,
    Motorbike,
    Car,
    Van,
}

/// Read-only view of the fleet directory. The engine never flips
/// availability itself; that is owned by the directory collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    pub name: String,
    pub is_available: bool,
    pub is_active: bool,
    pub vehicle_type: VehicleType,
    pub rating: f64,
}

impl Driver {
    pub fn can_take_batch(&self) -> bool {
        self.is_active && self.is_available
    }
}
