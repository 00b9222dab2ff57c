use serde::Serialize;
use uuid::Uuid;

use crate::error::DispatchError;
use crate::models::batch::BatchStatus;
use crate::state::AppState;

/// Proof that a driver passed validation, plus how many batches the
/// driver already holds. Fleet capacity limits are the caller's policy;
/// this service only surfaces the count.
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentConfirmation {
    pub driver_id: Uuid,
    pub active_batches: usize,
}

pub fn confirm_driver(
    state: &AppState,
    driver_id: Uuid,
) -> Result<AssignmentConfirmation, DispatchError> {
    {
        let driver = state
            .drivers
            .get(&driver_id)
            .ok_or_else(|| DispatchError::NotFound(format!("driver {driver_id} not found")))?;

        if !driver.can_take_batch() {
            return Err(DispatchError::DriverUnavailable(driver_id));
        }
    }

    let active_batches = state
        .batches
        .iter()
        .filter(|entry| {
            let batch = entry.value();
            batch.driver_id == Some(driver_id)
                && matches!(batch.status, BatchStatus::Assigned | BatchStatus::InTransit)
        })
        .count();

    Ok(AssignmentConfirmation {
        driver_id,
        active_batches,
    })
}
