use std::sync::Arc;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{admin, auth, blog, bookings, contact, experiences, health, instagram, payments};
use crate::services::rate_limit;
use crate::state::AppState;

async fn route_not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "route not found" })),
    )
}

fn cors(frontend_url: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true);

    match frontend_url.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            tracing::warn!(frontend_url, "FRONTEND_URL is not a valid origin, CORS disabled");
            layer
        }
    }
}

/// Every `/api` route with its middleware. Serve it with
/// `into_make_service_with_connect_info::<SocketAddr>()` so rate limits can
/// fall back to the peer address.
pub fn router(state: Arc<AppState>) -> Router {
    let contact_limit = from_fn_with_state(state.clone(), rate_limit::contact_limiter);
    let payments_limit = from_fn_with_state(state.clone(), rate_limit::payments_limiter);

    Router::new()
        .route("/api/health", get(health::health))
        // auth
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/2fa/setup", post(auth::setup_two_factor))
        .route("/api/auth/2fa/verify", post(auth::verify_two_factor))
        .route("/api/auth/2fa/enable", post(auth::enable_two_factor))
        .route("/api/auth/2fa/disable", post(auth::disable_two_factor))
        .route("/api/auth/2fa/backup", post(auth::use_backup_code))
        // experiences
        .route("/api/experiences", get(experiences::list_experiences))
        .route("/api/experiences/:slug", get(experiences::get_experience))
        .route(
            "/api/experiences/category/:category",
            get(experiences::list_by_category),
        )
        // bookings
        .route(
            "/api/bookings",
            post(bookings::create_booking).get(bookings::list_bookings),
        )
        .route("/api/bookings/:id", get(bookings::get_booking))
        .route("/api/bookings/:id/confirm", put(bookings::confirm_booking))
        .route("/api/bookings/:id/cancel", put(bookings::cancel_booking))
        // payments
        .route(
            "/api/payments/create-intent",
            post(payments::create_intent).layer(payments_limit),
        )
        .route("/api/payments/webhook", post(payments::payment_webhook))
        .route(
            "/api/payments/status/:payment_intent_id",
            get(payments::payment_status),
        )
        .route("/api/payments/refund", post(payments::refund))
        // blog
        .route("/api/blog/posts", get(blog::list_posts))
        .route("/api/blog/posts/:slug", get(blog::get_post))
        .route("/api/blog/categories", get(blog::list_categories))
        .route("/api/blog/featured", get(blog::featured_posts))
        // contact
        .route(
            "/api/contact",
            post(contact::submit_contact)
                .layer(contact_limit)
                .get(contact::list_contacts),
        )
        .route("/api/contact/:id/read", put(contact::mark_read))
        // instagram
        .route("/api/instagram/posts", get(instagram::list_posts))
        .route("/api/instagram/sync", post(instagram::sync_posts))
        // admin
        .route(
            "/api/admin/experiences",
            get(admin::list_experiences).post(admin::create_experience),
        )
        .route(
            "/api/admin/experiences/:id",
            put(admin::update_experience).delete(admin::delete_experience),
        )
        .route("/api/admin/experience-dates", post(admin::create_date))
        .route(
            "/api/admin/experience-dates/:id",
            put(admin::update_date).delete(admin::delete_date),
        )
        .route(
            "/api/admin/posts",
            get(admin::list_posts).post(admin::create_post),
        )
        .route(
            "/api/admin/posts/:id",
            put(admin::update_post).delete(admin::delete_post),
        )
        .route("/api/admin/categories", post(admin::create_category))
        .route(
            "/api/admin/testimonials",
            get(admin::list_testimonials).post(admin::create_testimonial),
        )
        .route(
            "/api/admin/testimonials/:id",
            put(admin::update_testimonial).delete(admin::delete_testimonial),
        )
        .route("/api/admin/dashboard", get(admin::get_dashboard))
        .fallback(route_not_found)
        .layer(from_fn_with_state(state.clone(), rate_limit::general_limiter))
        .layer(cors(&state.config.frontend_url))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
