use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub frontend_url: String,
    pub jwt_secret: String,
    pub jwt_expires_hours: i64,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub payment_currency: String,
    pub resend_api_key: String,
    pub email_from: String,
    pub admin_notify_email: String,
    pub instagram_access_token: String,
    pub instagram_user_id: String,
    pub instagram_sync_hours: u64,
    pub admin_email: String,
    pub admin_password: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "cumbre.db".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            jwt_secret: env::var("JWT_SECRET").unwrap_or_default(),
            jwt_expires_hours: env::var("JWT_EXPIRES_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(24 * 7),
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
            payment_currency: env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "mxn".to_string()),
            resend_api_key: env::var("RESEND_API_KEY").unwrap_or_default(),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "Cumbre <reservas@cumbre.example>".to_string()),
            admin_notify_email: env::var("ADMIN_NOTIFY_EMAIL").unwrap_or_default(),
            instagram_access_token: env::var("INSTAGRAM_ACCESS_TOKEN").unwrap_or_default(),
            instagram_user_id: env::var("INSTAGRAM_USER_ID").unwrap_or_default(),
            instagram_sync_hours: env::var("INSTAGRAM_SYNC_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(6),
            admin_email: env::var("ADMIN_EMAIL").unwrap_or_default(),
            admin_password: env::var("ADMIN_PASSWORD").unwrap_or_default(),
        }
    }
}
