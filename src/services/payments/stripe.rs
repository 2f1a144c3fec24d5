use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::PaymentProvider;
use crate::models::{NewPaymentIntent, PaymentIntent, Refund};

const API_BASE: &str = "https://api.stripe.com/v1";

pub struct StripeProvider {
    secret_key: String,
    client: reqwest::Client,
}

impl StripeProvider {
    pub fn new(secret_key: String) -> Self {
        Self {
            secret_key,
            client: reqwest::Client::new(),
        }
    }

    async fn parse<T: DeserializeOwned>(resp: reqwest::Response, what: &str) -> anyhow::Result<T> {
        let status = resp.status();
        let data: serde_json::Value = resp
            .json()
            .await
            .with_context(|| format!("failed to parse Stripe {what} response"))?;

        if !status.is_success() {
            let message = data["error"]["message"].as_str().unwrap_or("unknown error");
            anyhow::bail!("Stripe API error ({}): {}", status, message);
        }

        serde_json::from_value(data).with_context(|| format!("unexpected Stripe {what} payload"))
    }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    async fn create_intent(&self, intent: &NewPaymentIntent) -> anyhow::Result<PaymentIntent> {
        let mut form = vec![
            ("amount".to_string(), intent.amount.to_string()),
            ("currency".to_string(), intent.currency.clone()),
            ("description".to_string(), intent.description.clone()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];
        for (key, value) in &intent.metadata {
            form.push((format!("metadata[{key}]"), value.clone()));
        }

        let resp = self
            .client
            .post(format!("{API_BASE}/payment_intents"))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .context("failed to call Stripe API")?;

        Self::parse(resp, "payment intent").await
    }

    async fn retrieve_intent(&self, intent_id: &str) -> anyhow::Result<PaymentIntent> {
        let resp = self
            .client
            .get(format!("{API_BASE}/payment_intents/{intent_id}"))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .context("failed to call Stripe API")?;

        Self::parse(resp, "payment intent").await
    }

    async fn create_refund(
        &self,
        intent_id: &str,
        amount: Option<i64>,
        reason: &str,
    ) -> anyhow::Result<Refund> {
        let mut form = vec![
            ("payment_intent", intent_id.to_string()),
            ("reason", reason.to_string()),
        ];
        if let Some(amount) = amount {
            form.push(("amount", amount.to_string()));
        }

        let resp = self
            .client
            .post(format!("{API_BASE}/refunds"))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .context("failed to call Stripe API")?;

        Self::parse(resp, "refund").await
    }
}
