use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use cumbre::app;
use cumbre::config::AppConfig;
use cumbre::db;
use cumbre::db::queries::users;
use cumbre::models::{Role, User};
use cumbre::services::auth;
use cumbre::services::email::resend::ResendMailer;
use cumbre::services::instagram::{self, GraphMediaSource};
use cumbre::services::payments::stripe::StripeProvider;
use cumbre::state::AppState;

/// Creates the first admin from `ADMIN_EMAIL`/`ADMIN_PASSWORD` when none exists.
fn seed_admin(conn: &rusqlite::Connection, config: &AppConfig) -> anyhow::Result<()> {
    if users::count_admins(conn)? > 0 {
        return Ok(());
    }
    if config.admin_email.is_empty() || config.admin_password.is_empty() {
        tracing::warn!("no admin account exists and ADMIN_EMAIL/ADMIN_PASSWORD are not set");
        return Ok(());
    }

    let admin = User {
        id: Uuid::new_v4().to_string(),
        name: "Admin".to_string(),
        email: config.admin_email.trim().to_lowercase(),
        password_hash: auth::hash_password(&config.admin_password)?,
        role: Role::Admin,
        two_factor_enabled: false,
        two_factor_secret: None,
        backup_codes: vec![],
        created_at: Utc::now().naive_utc(),
    };
    users::create_user(conn, &admin)?;
    tracing::info!(email = %admin.email, "seeded admin account");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    anyhow::ensure!(
        config.jwt_secret.len() >= 32,
        "JWT_SECRET must be set to at least 32 bytes"
    );

    if config.stripe_secret_key.is_empty() {
        tracing::warn!("STRIPE_SECRET_KEY not set, payment intents will fail");
    }
    if config.stripe_webhook_secret.is_empty() {
        tracing::warn!("STRIPE_WEBHOOK_SECRET not set, webhooks will be rejected");
    }
    if config.resend_api_key.is_empty() {
        tracing::warn!("RESEND_API_KEY not set, emails will not be sent");
    }

    let conn = db::init_db(&config.database_url)?;
    seed_admin(&conn, &config)?;

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        payments: Box::new(StripeProvider::new(config.stripe_secret_key.clone())),
        mailer: Box::new(ResendMailer::new(
            config.resend_api_key.clone(),
            config.email_from.clone(),
        )),
        media: Box::new(GraphMediaSource::new(
            config.instagram_access_token.clone(),
            config.instagram_user_id.clone(),
        )),
    });

    if config.instagram_access_token.is_empty() {
        tracing::info!("Instagram not configured, periodic sync disabled");
    } else {
        let sync_state = state.clone();
        let every = Duration::from_secs(config.instagram_sync_hours.max(1) * 60 * 60);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                if let Err(e) = instagram::sync_posts(&sync_state).await {
                    tracing::error!(error = %e, "scheduled Instagram sync failed");
                }
            }
        });
    }

    let app = app::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}
