use hmac::{Hmac, Mac};
use rusqlite::{Connection, TransactionBehavior};
use sha2::Sha256;

use crate::db::queries::payment_events;
use crate::errors::AppError;
use crate::models::{EventOutcome, WebhookEvent};
use crate::services::bookings::{self, Confirmation};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age, either direction, of a signed webhook timestamp.
pub const TOLERANCE_SECS: i64 = 300;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("malformed signature header")]
    Malformed,

    #[error("signature timestamp outside tolerance")]
    Expired,

    #[error("signature mismatch")]
    Mismatch,
}

/// Checks a `t=<unix>,v1=<hex>` header against HMAC-SHA256 of `"{t}.{payload}"`.
/// Any of several `v1` entries may match.
pub fn verify_signature(
    secret: &str,
    header: &str,
    payload: &[u8],
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = vec![];

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }

    if (now - timestamp).abs() > TOLERANCE_SECS {
        return Err(SignatureError::Expired);
    }

    for expected in &signatures {
        let mut mac =
            HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Malformed)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        if mac.verify_slice(expected).is_ok() {
            return Ok(());
        }
    }

    Err(SignatureError::Mismatch)
}

/// Builds a header value the way the processor signs events.
pub fn sign(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

#[derive(Debug, PartialEq, Eq)]
pub enum WebhookOutcome {
    Duplicate,
    Processed {
        outcome: EventOutcome,
        booking_id: Option<String>,
    },
}

/// Applies a verified event. The ledger claim, the booking update and the
/// recorded outcome commit together, so a failure leaves the event unclaimed
/// and a redelivery is processed from scratch.
pub fn process_event(conn: &mut Connection, event: &WebhookEvent) -> Result<WebhookOutcome, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let intent = &event.data.object;
    let booking_id = intent.booking_id();

    if !payment_events::claim_event(&tx, &event.id, &event.event_type, booking_id)? {
        tracing::info!(event_id = %event.id, "duplicate webhook event ignored");
        return Ok(WebhookOutcome::Duplicate);
    }

    let outcome = match event.event_type.as_str() {
        "payment_intent.succeeded" => match booking_id {
            None => {
                tracing::warn!(event_id = %event.id, intent_id = %intent.id, "payment without bookingId metadata");
                EventOutcome::Ignored
            }
            Some(id) => match bookings::confirm_in(&tx, id, Some(&intent.id), intent.amount) {
                Ok(Confirmation::Confirmed(_)) => {
                    tracing::info!(booking_id = %id, amount = intent.amount, "booking confirmed by payment");
                    EventOutcome::Confirmed
                }
                Ok(Confirmation::AlreadyConfirmed(_)) => EventOutcome::AlreadyConfirmed,
                Err(
                    e @ (AppError::Capacity { .. } | AppError::BadRequest(_) | AppError::NotFound(_)),
                ) => {
                    tracing::error!(
                        booking_id = %id,
                        intent_id = %intent.id,
                        error = %e,
                        "paid booking could not be confirmed, refund required"
                    );
                    EventOutcome::Rejected
                }
                Err(e) => return Err(e),
            },
        },
        "payment_intent.payment_failed" => {
            tracing::warn!(booking_id = ?booking_id, intent_id = %intent.id, "payment failed");
            EventOutcome::PaymentFailed
        }
        other => {
            tracing::info!(event_type = %other, "unhandled webhook event type");
            EventOutcome::Ignored
        }
    };

    payment_events::record_outcome(&tx, &event.id, outcome)?;
    tx.commit()?;

    Ok(WebhookOutcome::Processed {
        outcome,
        booking_id: booking_id.map(str::to_string),
    })
}
