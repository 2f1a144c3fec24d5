use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use rusqlite::Connection;

use crate::db::queries::rate_limits;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Clone, Copy)]
pub struct Limit {
    pub scope: &'static str,
    pub max: i64,
    pub window_secs: i64,
    pub message: &'static str,
}

pub const GENERAL: Limit = Limit {
    scope: "general",
    max: 100,
    window_secs: 15 * 60,
    message: "too many requests, try again later",
};

pub const CONTACT: Limit = Limit {
    scope: "contact",
    max: 10,
    window_secs: 60 * 60,
    message: "too many contact requests, try again in an hour",
};

pub const PAYMENTS: Limit = Limit {
    scope: "payments",
    max: 10,
    window_secs: 15 * 60,
    message: "too many payment attempts, try again later",
};

/// Counted on failed logins only; a success resets it.
pub const LOGIN_FAILURES: Limit = Limit {
    scope: "login",
    max: 5,
    window_secs: 15 * 60,
    message: "too many login attempts, try again in 15 minutes",
};

const EXEMPT_PATHS: [&str; 2] = ["/api/payments/webhook", "/api/health"];

pub fn key(limit: &Limit, client: &str) -> String {
    format!("{}:{}", limit.scope, client)
}

/// Counts one hit and returns whether it is still within the limit.
pub fn hit(conn: &Connection, limit: &Limit, client: &str) -> anyhow::Result<bool> {
    let count = rate_limits::increment(conn, &key(limit, client), limit.window_secs)?;
    if count == 1 {
        // first hit of a fresh window; good moment to drop stale rows
        rate_limits::cleanup_old_windows(conn, 24 * 60 * 60)?;
    }
    Ok(count <= limit.max)
}

pub fn enforce(conn: &Connection, limit: &Limit, client: &str) -> Result<(), AppError> {
    if hit(conn, limit, client)? {
        Ok(())
    } else {
        tracing::warn!(scope = limit.scope, client = %client, "rate limit exceeded");
        Err(AppError::RateLimited(limit.message.to_string()))
    }
}

pub fn is_blocked(conn: &Connection, limit: &Limit, client: &str) -> anyhow::Result<bool> {
    Ok(rate_limits::current_count(conn, &key(limit, client), limit.window_secs)? >= limit.max)
}

/// First hop of `X-Forwarded-For`, then `X-Real-IP`, then the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded
        .or(real_ip)
        .map(str::to_string)
        .or_else(|| peer.map(|p| p.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn request_client(req: &Request) -> String {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    client_ip(req.headers(), peer)
}

async fn limited(state: &AppState, limit: &Limit, req: Request, next: Next) -> Response {
    let client = request_client(&req);
    let allowed = match state.db() {
        Ok(db) => enforce(&db, limit, &client),
        Err(e) => Err(e),
    };
    if let Err(e) = allowed {
        return e.into_response();
    }

    next.run(req).await
}

/// Applied to the whole router. Webhook deliveries and health checks skip it.
pub async fn general_limiter(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let path = req.uri().path();
    if !path.starts_with("/api/") || EXEMPT_PATHS.contains(&path) {
        return next.run(req).await;
    }
    limited(&state, &GENERAL, req, next).await
}

pub async fn contact_limiter(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    limited(&state, &CONTACT, req, next).await
}

pub async fn payments_limiter(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    limited(&state, &PAYMENTS, req, next).await
}
