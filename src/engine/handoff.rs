use chrono::Utc;
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use crate::engine::status;
use crate::error::DispatchError;
use crate::models::order::{Order, OrderStatus};
use crate::models::verification::{HandoffKind, VerificationCode};
use crate::notify::{publish, DispatchEvent};
use crate::state::AppState;

/// Order status that must hold before a code of this kind can be issued.
fn gate_status(kind: HandoffKind) -> OrderStatus {
    match kind {
        HandoffKind::Pickup => OrderStatus::ReadyForPickup,
        HandoffKind::Delivery => OrderStatus::InTransit,
    }
}

/// Order status a successful validation advances to.
fn target_status(kind: HandoffKind) -> OrderStatus {
    match kind {
        HandoffKind::Pickup => OrderStatus::PickedUp,
        HandoffKind::Delivery => OrderStatus::Delivered,
    }
}

fn mint_otp() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{n:06}")
}

fn mint_qr_token(order_id: Uuid, kind: HandoffKind) -> String {
    let nonce: u128 = rand::random();

    let mut hasher = Sha256::new();
    hasher.update(order_id.as_bytes());
    hasher.update([match kind {
        HandoffKind::Pickup => 0u8,
        HandoffKind::Delivery => 1u8,
    }]);
    hasher.update(nonce.to_be_bytes());

    hex::encode(hasher.finalize())
}

/// Mints a fresh code for the order's next handoff. Reissuing replaces
/// the slot for (order, kind), so a prior code stops validating the
/// moment the new one exists.
pub fn issue_code(
    state: &AppState,
    order_id: Uuid,
    kind: HandoffKind,
) -> Result<VerificationCode, DispatchError> {
    {
        let order = state
            .orders
            .get(&order_id)
            .ok_or_else(|| DispatchError::NotFound(format!("order {order_id} not found")))?;

        let expected = gate_status(kind);
        if order.status != expected {
            return Err(DispatchError::BadRequest(format!(
                "order {order_id} is {:?}, must be {expected:?} to issue a {kind:?} code",
                order.status
            )));
        }
    }

    let code = VerificationCode {
        order_id,
        kind,
        otp: mint_otp(),
        qr_token: mint_qr_token(order_id, kind),
        issued_at: Utc::now(),
        consumed_at: None,
        superseded: false,
    };

    state.codes.insert((order_id, kind), code.clone());
    info!(order_id = %order_id, kind = ?kind, "verification code issued");

    Ok(code)
}

/// Validates a submitted proof (OTP or QR token) and consumes the code.
/// The check and the mark happen in one step under the code's entry
/// lock, so a retried submission can never validate twice.
pub fn validate_code(
    state: &AppState,
    order_id: Uuid,
    kind: HandoffKind,
    submitted: &str,
) -> Result<Order, DispatchError> {
    let result = validate_inner(state, order_id, kind, submitted);

    let outcome = match &result {
        Ok(_) => "success",
        Err(DispatchError::CodeInvalid) => "invalid",
        Err(DispatchError::CodeAlreadyUsed) => "already_used",
        Err(DispatchError::CodeExpired) => "expired",
        Err(_) => "error",
    };
    state
        .metrics
        .handoff_validations_total
        .with_label_values(&[outcome])
        .inc();

    result
}

fn validate_inner(
    state: &AppState,
    order_id: Uuid,
    kind: HandoffKind,
    submitted: &str,
) -> Result<Order, DispatchError> {
    let target = target_status(kind);

    // dry-run the advance so a code is never burned on an order that
    // cannot actually move yet
    {
        let order = state
            .orders
            .get(&order_id)
            .ok_or(DispatchError::CodeInvalid)?;
        let batch_status = order
            .batch_id
            .and_then(|id| state.batches.get(&id).map(|b| b.status));

        let mut probe = order.clone();
        status::apply(&mut probe, target, batch_status, None, Utc::now())?;
    }

    let now = Utc::now();
    {
        let mut entry = state
            .codes
            .get_mut(&(order_id, kind))
            .ok_or(DispatchError::CodeInvalid)?;
        let code = entry.value_mut();

        // a single CodeInvalid for both unknown order and wrong code,
        // so the caller learns nothing about which part failed
        if code.otp != submitted && code.qr_token != submitted {
            return Err(DispatchError::CodeInvalid);
        }
        if code.superseded {
            return Err(DispatchError::CodeInvalid);
        }
        if code.consumed_at.is_some() {
            return Err(DispatchError::CodeAlreadyUsed);
        }
        if now - code.issued_at > state.code_ttl {
            return Err(DispatchError::CodeExpired);
        }

        code.consumed_at = Some(now);
    }

    let order = status::advance_order(state, order_id, target, None)?;

    info!(order_id = %order_id, kind = ?kind, "handoff validated");
    publish(state, DispatchEvent::HandoffValidated { order_id, kind });

    Ok(order)
}
