use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::extract::{AdminUser, ValidJson};
use crate::db::queries::bookings;
use crate::errors::AppError;
use crate::models::{BookingStatus, EventOutcome, NewPaymentIntent, WebhookEvent};
use crate::services::payments::webhook::{self, WebhookOutcome};
use crate::services::email;
use crate::state::AppState;

// POST /api/payments/create-intent
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateIntentRequest {
    #[validate(length(min = 1, message = "bookingId is required"))]
    pub booking_id: String,
    /// Minor units.
    #[validate(range(min = 1, message = "amount must be positive"))]
    pub amount: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentResponse {
    pub client_secret: Option<String>,
    pub payment_intent_id: String,
}

pub async fn create_intent(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<CreateIntentRequest>,
) -> Result<Json<CreateIntentResponse>, AppError> {
    let details = {
        let db = state.db()?;
        bookings::get_booking_details(&db, &req.booking_id)?
            .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?
    };

    if details.booking.status != BookingStatus::Pending {
        return Err(AppError::BadRequest("booking is not awaiting payment".to_string()));
    }

    let new_intent = NewPaymentIntent {
        amount: req.amount,
        currency: state.config.payment_currency.clone(),
        description: format!(
            "Anticipo para {} - {}",
            details.experience.title, details.booking.client_name
        ),
        metadata: vec![
            ("bookingId".to_string(), details.booking.id.clone()),
            ("experienceTitle".to_string(), details.experience.title.clone()),
            ("clientEmail".to_string(), details.booking.client_email.clone()),
        ],
    };

    let intent = state
        .payments
        .create_intent(&new_intent)
        .await
        .map_err(|e| AppError::Payment(e.to_string()))?;

    {
        let db = state.db()?;
        bookings::set_payment_intent(&db, &details.booking.id, &intent.id)?;
    }
    tracing::info!(booking_id = %details.booking.id, intent_id = %intent.id, amount = req.amount, "payment intent created");

    Ok(Json(CreateIntentResponse {
        client_secret: intent.client_secret,
        payment_intent_id: intent.id,
    }))
}

// POST /api/payments/webhook
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("missing signature".to_string()))?;

    if state.config.stripe_webhook_secret.is_empty() {
        tracing::error!("STRIPE_WEBHOOK_SECRET not set, rejecting webhook");
        return Err(AppError::BadRequest("webhook signature verification failed".to_string()));
    }

    if let Err(e) = webhook::verify_signature(
        &state.config.stripe_webhook_secret,
        signature,
        &body,
        Utc::now().timestamp(),
    ) {
        tracing::warn!(error = %e, "webhook signature verification failed");
        return Err(AppError::BadRequest("webhook signature verification failed".to_string()));
    }

    let event: WebhookEvent = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(error = %e, "unparseable webhook payload");
        AppError::BadRequest("invalid webhook payload".to_string())
    })?;

    let outcome = {
        let mut db = state.db()?;
        webhook::process_event(&mut db, &event)?
    };

    match outcome {
        WebhookOutcome::Duplicate => Ok(Json(serde_json::json!({
            "received": true,
            "duplicate": true,
        }))),
        WebhookOutcome::Processed { outcome, booking_id } => {
            if let (EventOutcome::Confirmed, Some(id)) = (outcome, booking_id.as_deref()) {
                let details = {
                    let db = state.db()?;
                    bookings::get_booking_details(&db, id)?
                };
                if let Some(details) = details {
                    email::send_booking_confirmation(state.mailer.as_ref(), &details).await;
                }
            }
            Ok(Json(serde_json::json!({ "received": true })))
        }
    }
}

// GET /api/payments/status/:payment_intent_id
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusResponse {
    pub status: String,
    pub amount: i64,
    pub currency: String,
    pub booking_id: Option<String>,
}

pub async fn payment_status(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(intent_id): Path<String>,
) -> Result<Json<PaymentStatusResponse>, AppError> {
    let intent = state
        .payments
        .retrieve_intent(&intent_id)
        .await
        .map_err(|e| AppError::Payment(e.to_string()))?;

    Ok(Json(PaymentStatusResponse {
        booking_id: intent.metadata.get("bookingId").cloned(),
        status: intent.status,
        amount: intent.amount,
        currency: intent.currency,
    }))
}

// POST /api/payments/refund
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct RefundRequest {
    #[validate(length(min = 1, message = "paymentIntentId is required"))]
    pub payment_intent_id: String,
    #[validate(range(min = 1, message = "amount must be positive"))]
    pub amount: Option<i64>,
    pub reason: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundResponse {
    pub refund_id: String,
    pub status: String,
    pub amount: i64,
}

pub async fn refund(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    ValidJson(req): ValidJson<RefundRequest>,
) -> Result<Json<RefundResponse>, AppError> {
    let reason = req.reason.as_deref().unwrap_or("requested_by_customer");

    let refund = state
        .payments
        .create_refund(&req.payment_intent_id, req.amount, reason)
        .await
        .map_err(|e| AppError::Payment(e.to_string()))?;

    tracing::info!(
        intent_id = %req.payment_intent_id,
        refund_id = %refund.id,
        admin_id = %admin.id,
        "refund created"
    );

    Ok(Json(RefundResponse {
        refund_id: refund.id,
        status: refund.status,
        amount: refund.amount,
    }))
}
