pub mod stripe;
pub mod webhook;

use async_trait::async_trait;

use crate::models::{NewPaymentIntent, PaymentIntent, Refund};

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_intent(&self, intent: &NewPaymentIntent) -> anyhow::Result<PaymentIntent>;

    async fn retrieve_intent(&self, intent_id: &str) -> anyhow::Result<PaymentIntent>;

    /// Full refund when `amount` is `None`.
    async fn create_refund(
        &self,
        intent_id: &str,
        amount: Option<i64>,
        reason: &str,
    ) -> anyhow::Result<Refund>;
}
