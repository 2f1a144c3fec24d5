use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;

use super::{EmailMessage, Mailer};

pub struct ResendMailer {
    api_key: String,
    from: String,
    client: reqwest::Client,
}

impl ResendMailer {
    pub fn new(api_key: String, from: String) -> Self {
        Self {
            api_key,
            from,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        if self.api_key.is_empty() {
            anyhow::bail!("RESEND_API_KEY not configured");
        }

        let mut body = json!({
            "from": self.from,
            "to": [message.to],
            "subject": message.subject,
            "html": message.html,
        });
        if let Some(reply_to) = &message.reply_to {
            body["reply_to"] = json!(reply_to);
        }

        let resp = self
            .client
            .post("https://api.resend.com/emails")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("failed to call Resend API")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Resend API error ({}): {}", status, text);
        }

        tracing::info!(to = %message.to, subject = %message.subject, "email sent");
        Ok(())
    }
}
