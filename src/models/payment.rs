use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Signed event delivered to `/api/payments/webhook`.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    pub object: PaymentIntentObject,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentIntentObject {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PaymentIntentObject {
    pub fn booking_id(&self) -> Option<&str> {
        self.metadata
            .get("bookingId")
            .map(|s| s.as_str())
            .filter(|s| !s.is_empty())
    }
}

/// Result recorded in the `payment_events` ledger for each processed event.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    Confirmed,
    AlreadyConfirmed,
    Rejected,
    PaymentFailed,
    Ignored,
}

impl EventOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventOutcome::Confirmed => "confirmed",
            EventOutcome::AlreadyConfirmed => "already_confirmed",
            EventOutcome::Rejected => "rejected",
            EventOutcome::PaymentFailed => "payment_failed",
            EventOutcome::Ignored => "ignored",
        }
    }
}

/// Parameters for a new payment intent at the processor.
#[derive(Debug, Clone)]
pub struct NewPaymentIntent {
    pub amount: i64,
    pub currency: String,
    pub description: String,
    pub metadata: Vec<(String, String)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub status: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    pub id: String,
    pub status: String,
    pub amount: i64,
}
