pub mod resend;
pub mod templates;

use async_trait::async_trait;

use crate::models::{BookingDetails, ContactForm};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub reply_to: Option<String>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()>;
}

/// Sends the client confirmation. Failures are logged and dropped: the
/// booking is already confirmed and stays that way.
pub async fn send_booking_confirmation(mailer: &dyn Mailer, details: &BookingDetails) {
    let message = templates::booking_confirmation(details);
    if let Err(e) = mailer.send(&message).await {
        tracing::error!(booking_id = %details.booking.id, error = %e, "failed to send booking confirmation");
    }
}

/// Notifies the admin inbox about a new contact form. No-op when no inbox is configured.
pub async fn send_contact_notification(mailer: &dyn Mailer, admin_email: &str, form: &ContactForm) {
    if admin_email.is_empty() {
        tracing::warn!("ADMIN_NOTIFY_EMAIL not set, skipping contact notification");
        return;
    }

    let message = templates::contact_notification(admin_email, form);
    if let Err(e) = mailer.send(&message).await {
        tracing::error!(contact_id = %form.id, error = %e, "failed to send contact notification");
    }
}
