use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::DispatchError;
use crate::models::batch::BatchStatus;
use crate::models::order::Order;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimFailure {
    AlreadyClaimed,
    NotEligible,
    NotFound,
}

impl ClaimFailure {
    fn as_label(self) -> &'static str {
        match self {
            ClaimFailure::AlreadyClaimed => "already_claimed",
            ClaimFailure::NotEligible => "not_eligible",
            ClaimFailure::NotFound => "not_found",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRejection {
    pub order_id: Uuid,
    pub reason: ClaimFailure,
}

/// Partial success is first-class: the caller proceeds with whatever
/// subset was claimed and is told which orders were not, and why.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimReport {
    pub claimed: Vec<Uuid>,
    pub rejected: Vec<ClaimRejection>,
}

fn is_claimable(order: &Order, zone_id: &str, date: NaiveDate) -> bool {
    order.scheduled
        && order.zone_id == zone_id
        && order.scheduled_date == date
        && order.batch_id.is_none()
        && order.status.is_pre_dispatch()
}

/// Pure read: orders that could be claimed into a batch for this
/// zone and scheduled date right now.
pub fn eligible_orders(state: &AppState, zone_id: &str, date: NaiveDate) -> Vec<Order> {
    state
        .orders
        .iter()
        .filter_map(|entry| {
            let order = entry.value();
            if is_claimable(order, zone_id, date) {
                Some(order.clone())
            } else {
                None
            }
        })
        .collect()
}

/// Atomically claims each requested order for the batch. The write per
/// order is conditional ("set batch_id where batch_id is null and the
/// order is eligible") and happens under that order's entry lock, so
/// concurrent claimers cannot both win the same order.
pub fn claim_orders(
    state: &AppState,
    batch_id: Uuid,
    order_ids: &[Uuid],
) -> Result<ClaimReport, DispatchError> {
    let (zone_id, date, batch_status, member_count) = {
        let batch = state
            .batches
            .get(&batch_id)
            .ok_or_else(|| DispatchError::NotFound(format!("batch {batch_id} not found")))?;
        (
            batch.zone_id.clone(),
            batch.scheduled_date,
            batch.status,
            batch.order_ids.len(),
        )
    };

    if batch_status != BatchStatus::Collecting {
        return Err(DispatchError::InvalidTransition {
            from: format!("{batch_status:?}"),
            to: "claim".to_string(),
        });
    }

    let cap = state.max_orders_per_batch;
    let mut report = ClaimReport::default();

    for &order_id in order_ids {
        if cap > 0 && member_count + report.claimed.len() >= cap {
            report.rejected.push(ClaimRejection {
                order_id,
                reason: ClaimFailure::NotEligible,
            });
            continue;
        }

        let Some(mut order) = state.orders.get_mut(&order_id) else {
            report.rejected.push(ClaimRejection {
                order_id,
                reason: ClaimFailure::NotFound,
            });
            continue;
        };

        if order.batch_id == Some(batch_id) {
            // already ours, e.g. a retried request
            report.claimed.push(order_id);
            continue;
        }

        if order.batch_id.is_some() {
            report.rejected.push(ClaimRejection {
                order_id,
                reason: ClaimFailure::AlreadyClaimed,
            });
            continue;
        }

        if !is_claimable(&order, &zone_id, date) {
            report.rejected.push(ClaimRejection {
                order_id,
                reason: ClaimFailure::NotEligible,
            });
            continue;
        }

        order.batch_id = Some(batch_id);
        report.claimed.push(order_id);
    }

    // attach membership, re-checking batch status at write time
    {
        let mut batch = state
            .batches
            .get_mut(&batch_id)
            .ok_or_else(|| DispatchError::NotFound(format!("batch {batch_id} not found")))?;

        if batch.status != BatchStatus::Collecting {
            let status = batch.status;
            drop(batch);
            warn!(batch_id = %batch_id, "batch left collecting mid-claim; rolling back");
            release_orders(state, batch_id, &report.claimed);
            return Err(DispatchError::InvalidTransition {
                from: format!("{status:?}"),
                to: "claim".to_string(),
            });
        }

        for id in &report.claimed {
            if !batch.order_ids.contains(id) {
                batch.order_ids.push(*id);
            }
        }
    }

    state
        .metrics
        .claims_total
        .with_label_values(&["claimed"])
        .inc_by(report.claimed.len() as u64);
    for rejection in &report.rejected {
        state
            .metrics
            .claims_total
            .with_label_values(&[rejection.reason.as_label()])
            .inc();
    }

    info!(
        batch_id = %batch_id,
        claimed = report.claimed.len(),
        rejected = report.rejected.len(),
        "claim processed"
    );

    Ok(report)
}

/// Clears the claim on the given orders. Only orders currently held by
/// this batch are touched.
pub fn release_orders(state: &AppState, batch_id: Uuid, order_ids: &[Uuid]) {
    for order_id in order_ids {
        if let Some(mut order) = state.orders.get_mut(order_id) {
            if order.batch_id == Some(batch_id) {
                order.batch_id = None;
            }
        }
    }
}
