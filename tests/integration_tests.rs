use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use cumbre::app;
use cumbre::config::AppConfig;
use cumbre::db;
use cumbre::db::queries::{bookings, experiences, rate_limits, users};
use cumbre::models::{
    Booking, BookingStatus, Difficulty, Experience, ExperienceCategory, ExperienceDate,
    NewPaymentIntent, PaymentIntent, Refund, RemoteMedia, Role, User,
};
use cumbre::services::email::{EmailMessage, Mailer};
use cumbre::services::instagram::MediaSource;
use cumbre::services::payments::webhook;
use cumbre::services::payments::PaymentProvider;
use cumbre::services::{auth, rate_limit, two_factor};
use cumbre::state::AppState;

const JWT_SECRET: &str = "test-jwt-secret";
const WEBHOOK_SECRET: &str = "whsec_test";

// ── Mock Providers ──

#[derive(Default)]
struct MockPayments {
    created: AtomicUsize,
    lookups: Arc<Mutex<Vec<String>>>,
    refunds: Arc<Mutex<Vec<(String, Option<i64>, String)>>>,
}

#[async_trait]
impl PaymentProvider for MockPayments {
    async fn create_intent(&self, intent: &NewPaymentIntent) -> anyhow::Result<PaymentIntent> {
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PaymentIntent {
            id: format!("pi_mock_{n}"),
            client_secret: Some(format!("pi_mock_{n}_secret")),
            status: "requires_payment_method".to_string(),
            amount: intent.amount,
            currency: intent.currency.clone(),
            metadata: intent.metadata.iter().cloned().collect(),
        })
    }

    async fn retrieve_intent(&self, intent_id: &str) -> anyhow::Result<PaymentIntent> {
        self.lookups.lock().unwrap().push(intent_id.to_string());
        Ok(PaymentIntent {
            id: intent_id.to_string(),
            client_secret: None,
            status: "succeeded".to_string(),
            amount: 500,
            currency: "mxn".to_string(),
            metadata: HashMap::from([("bookingId".to_string(), "b-1".to_string())]),
        })
    }

    async fn create_refund(
        &self,
        intent_id: &str,
        amount: Option<i64>,
        reason: &str,
    ) -> anyhow::Result<Refund> {
        self.refunds
            .lock()
            .unwrap()
            .push((intent_id.to_string(), amount, reason.to_string()));
        Ok(Refund {
            id: "re_mock".to_string(),
            status: "succeeded".to_string(),
            amount: amount.unwrap_or(500),
        })
    }
}

#[derive(Default)]
struct MockMailer {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _message: &EmailMessage) -> anyhow::Result<()> {
        anyhow::bail!("email provider unavailable")
    }
}

struct MockMedia;

#[async_trait]
impl MediaSource for MockMedia {
    async fn fetch_recent(&self, _limit: u32) -> anyhow::Result<Vec<RemoteMedia>> {
        let media = |id: &str, kind: &str| RemoteMedia {
            id: id.to_string(),
            media_url: format!("https://cdn.example/{id}.jpg"),
            caption: Some("Amanecer en el Iztaccíhuatl".to_string()),
            permalink: format!("https://instagram.com/p/{id}"),
            timestamp: "2026-09-01T12:30:00+0000".to_string(),
            media_type: kind.to_string(),
        };
        Ok(vec![
            media("ig1", "IMAGE"),
            media("ig2", "VIDEO"),
            media("ig3", "CAROUSEL_ALBUM"),
        ])
    }
}

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        port: 5000,
        database_url: ":memory:".to_string(),
        frontend_url: "http://localhost:3000".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        jwt_expires_hours: 1,
        stripe_secret_key: "".to_string(),
        stripe_webhook_secret: WEBHOOK_SECRET.to_string(),
        payment_currency: "mxn".to_string(),
        resend_api_key: "".to_string(),
        email_from: "Cumbre <reservas@cumbre.example>".to_string(),
        admin_notify_email: "admin@cumbre.example".to_string(),
        instagram_access_token: "".to_string(),
        instagram_user_id: "".to_string(),
        instagram_sync_hours: 6,
        admin_email: "".to_string(),
        admin_password: "".to_string(),
    }
}

fn build_state(payments: MockPayments, mailer: Box<dyn Mailer>) -> Arc<AppState> {
    let conn = db::init_db(":memory:").unwrap();
    Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: test_config(),
        payments: Box::new(payments),
        mailer,
        media: Box::new(MockMedia),
    })
}

fn state_with_mailer(mailer: Box<dyn Mailer>) -> Arc<AppState> {
    build_state(MockPayments::default(), mailer)
}

fn test_state() -> (Arc<AppState>, Arc<Mutex<Vec<EmailMessage>>>) {
    let mailer = MockMailer::default();
    let sent = Arc::clone(&mailer.sent);
    (state_with_mailer(Box::new(mailer)), sent)
}

/// Experience `exp-1` (slug `nevado`, 1000 per person) with date `date-1`.
fn seed(state: &AppState, max_attendees: i64) {
    let db = state.db.lock().unwrap();
    let now = Utc::now().naive_utc();
    experiences::create_experience(
        &db,
        &Experience {
            id: "exp-1".to_string(),
            title: "Nevado de Toluca".to_string(),
            slug: "nevado".to_string(),
            description: "Ascenso guiado".to_string(),
            content: "Itinerario completo".to_string(),
            category: ExperienceCategory::Iniciacion,
            difficulty: Difficulty::Principiante,
            duration: "1 día".to_string(),
            price: 1000,
            includes: vec!["Guía".to_string()],
            excludes: vec![],
            images: vec![],
            video_url: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        },
    )
    .unwrap();

    let start = Utc::now().date_naive() + Duration::days(30);
    experiences::create_date(
        &db,
        &ExperienceDate {
            id: "date-1".to_string(),
            experience_id: "exp-1".to_string(),
            start_date: start,
            end_date: start + Duration::days(1),
            max_attendees,
            price: None,
            is_active: true,
            created_at: now,
        },
    )
    .unwrap();
}

fn insert_booking(state: &AppState, id: &str, attendees: i64, status: BookingStatus) {
    let db = state.db.lock().unwrap();
    let now = Utc::now().naive_utc();
    bookings::insert_booking(
        &db,
        &Booking {
            id: id.to_string(),
            experience_id: "exp-1".to_string(),
            experience_date_id: "date-1".to_string(),
            client_name: "Ana Torres".to_string(),
            client_email: "ana@example.com".to_string(),
            client_phone: "5551234567".to_string(),
            attendees,
            notes: None,
            total_amount: attendees * 1000,
            paid_amount: 0,
            payment_intent_id: None,
            status,
            created_at: now,
            updated_at: now,
        },
    )
    .unwrap();
}

fn booking_status(state: &AppState, id: &str) -> BookingStatus {
    let db = state.db.lock().unwrap();
    bookings::get_booking(&db, id).unwrap().unwrap().status
}

fn token_for(state: &AppState, role: Role) -> String {
    let user = User {
        id: format!("user-{}", role.as_str().to_lowercase()),
        name: "Test User".to_string(),
        email: format!("{}@cumbre.example", role.as_str().to_lowercase()),
        password_hash: auth::hash_password("secret123").unwrap(),
        role,
        two_factor_enabled: false,
        two_factor_secret: None,
        backup_codes: vec![],
        created_at: Utc::now().naive_utc(),
    };
    users::create_user(&state.db.lock().unwrap(), &user).unwrap();
    auth::issue_token(&user, JWT_SECRET, 1).unwrap()
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn webhook_request(event_id: &str, booking_id: &str, amount: i64) -> Request<Body> {
    let payload = json!({
        "id": event_id,
        "type": "payment_intent.succeeded",
        "data": { "object": {
            "id": format!("pi_{booking_id}"),
            "amount": amount,
            "metadata": { "bookingId": booking_id }
        }}
    })
    .to_string();
    let signature = webhook::sign(WEBHOOK_SECRET, Utc::now().timestamp(), payload.as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/payments/webhook")
        .header("Content-Type", "application/json")
        .header("stripe-signature", signature)
        .body(Body::from(payload))
        .unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn booking_body(attendees: i64) -> Value {
    json!({
        "experienceId": "exp-1",
        "experienceDateId": "date-1",
        "clientName": "Luis Pérez",
        "clientEmail": "luis@example.com",
        "clientPhone": "5559876543",
        "attendees": attendees,
    })
}

// ── Health & routing ──

#[tokio::test]
async fn test_health() {
    let (state, _) = test_state();
    let app = app::router(state);

    let (status, json) = send(&app, get_request("/api/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "OK");
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let (state, _) = test_state();
    let app = app::router(state);

    let (status, json) = send(&app, get_request("/api/nope", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].is_string());
}

// ── Experiences ──

#[tokio::test]
async fn test_experience_listing_and_detail() {
    let (state, _) = test_state();
    seed(&state, 10);
    insert_booking(&state, "b1", 4, BookingStatus::Confirmed);
    let app = app::router(state);

    let (status, json) = send(&app, get_request("/api/experiences?category=INICIACION", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["slug"], "nevado");

    let (status, json) = send(&app, get_request("/api/experiences/nevado", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["dates"][0]["availableSpots"], 6);
    assert_eq!(json["dates"][0]["isAvailable"], true);

    let (status, _) = send(&app, get_request("/api/experiences/category/ALPINISMO", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, get_request("/api/experiences/no-existe", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Bookings ──

#[tokio::test]
async fn test_booking_rejected_when_capacity_exceeded() {
    let (state, _) = test_state();
    seed(&state, 10);
    insert_booking(&state, "b1", 8, BookingStatus::Confirmed);
    let app = app::router(state.clone());

    let (status, json) = send(&app, json_request("POST", "/api/bookings", None, booking_body(5))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["availableSpots"], 2);

    let (_, total) = bookings::list_bookings(&state.db.lock().unwrap(), None, None, 50, 0).unwrap();
    assert_eq!(total, 1);

    let (status, json) = send(&app, json_request("POST", "/api/bookings", None, booking_body(2))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["status"], "PENDING");
    assert_eq!(json["totalAmount"], 2000);
    assert_eq!(json["experience"]["slug"], "nevado");
}

#[tokio::test]
async fn test_booking_validation_errors() {
    let (state, _) = test_state();
    seed(&state, 10);
    let app = app::router(state);

    let mut body = booking_body(0);
    body["clientEmail"] = json!("not-an-email");
    let (status, json) = send(&app, json_request("POST", "/api/bookings", None, body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields: Vec<&str> = json["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"attendees"));
    assert!(fields.contains(&"clientEmail"));

    let req = Request::builder()
        .method("POST")
        .uri("/api/bookings")
        .header("Content-Type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cancelled_booking_cannot_be_confirmed() {
    let (state, _) = test_state();
    seed(&state, 10);
    insert_booking(&state, "b1", 2, BookingStatus::Pending);
    let admin = token_for(&state, Role::Admin);
    let app = app::router(state.clone());

    let (status, json) = send(&app, json_request("PUT", "/api/bookings/b1/cancel", Some(&admin), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "CANCELLED");

    let (status, _) = send(&app, json_request("PUT", "/api/bookings/b1/confirm", Some(&admin), json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(booking_status(&state, "b1"), BookingStatus::Cancelled);
}

#[tokio::test]
async fn test_confirm_succeeds_when_email_fails() {
    let state = state_with_mailer(Box::new(FailingMailer));
    seed(&state, 10);
    insert_booking(&state, "b1", 2, BookingStatus::Pending);
    let admin = token_for(&state, Role::Admin);
    let app = app::router(state.clone());

    let (status, json) = send(
        &app,
        json_request("PUT", "/api/bookings/b1/confirm", Some(&admin), json!({ "paidAmount": 500 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "CONFIRMED");
    assert_eq!(json["paidAmount"], 500);
}

#[tokio::test]
async fn test_admin_endpoints_require_admin() {
    let (state, _) = test_state();
    seed(&state, 10);
    let client = token_for(&state, Role::Client);
    let app = app::router(state);

    let (status, _) = send(&app, get_request("/api/bookings", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, get_request("/api/bookings", Some("garbage"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, get_request("/api/admin/dashboard", Some(&client))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// ── Payments ──

#[tokio::test]
async fn test_create_intent_for_pending_booking() {
    let (state, _) = test_state();
    seed(&state, 10);
    insert_booking(&state, "b1", 2, BookingStatus::Pending);
    insert_booking(&state, "b2", 2, BookingStatus::Confirmed);
    let app = app::router(state.clone());

    let (status, json) = send(
        &app,
        json_request("POST", "/api/payments/create-intent", None, json!({ "bookingId": "b1", "amount": 500 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["paymentIntentId"], "pi_mock_1");
    assert_eq!(json["clientSecret"], "pi_mock_1_secret");

    let stored = bookings::get_booking(&state.db.lock().unwrap(), "b1").unwrap().unwrap();
    assert_eq!(stored.payment_intent_id.as_deref(), Some("pi_mock_1"));

    let (status, _) = send(
        &app,
        json_request("POST", "/api/payments/create-intent", None, json!({ "bookingId": "b2", "amount": 500 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_payment_status_is_admin_only() {
    let payments = MockPayments::default();
    let lookups = Arc::clone(&payments.lookups);
    let state = build_state(payments, Box::new(MockMailer::default()));
    let client = token_for(&state, Role::Client);
    let admin = token_for(&state, Role::Admin);
    let app = app::router(state);

    let (status, _) = send(&app, get_request("/api/payments/status/pi_42", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app, get_request("/api/payments/status/pi_42", Some(&client))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(lookups.lock().unwrap().is_empty());

    let (status, json) = send(&app, get_request("/api/payments/status/pi_42", Some(&admin))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "succeeded");
    assert_eq!(json["amount"], 500);
    assert_eq!(json["currency"], "mxn");
    assert_eq!(json["bookingId"], "b-1");
    assert_eq!(*lookups.lock().unwrap(), vec!["pi_42".to_string()]);
}

#[tokio::test]
async fn test_refund_defaults_and_partial_amount() {
    let payments = MockPayments::default();
    let refunds = Arc::clone(&payments.refunds);
    let state = build_state(payments, Box::new(MockMailer::default()));
    let client = token_for(&state, Role::Client);
    let admin = token_for(&state, Role::Admin);
    let app = app::router(state);

    let (status, _) = send(
        &app,
        json_request("POST", "/api/payments/refund", Some(&client), json!({ "paymentIntentId": "pi_7" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(refunds.lock().unwrap().is_empty());

    let (status, json) = send(
        &app,
        json_request("POST", "/api/payments/refund", Some(&admin), json!({ "paymentIntentId": "pi_7" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["refundId"], "re_mock");
    assert_eq!(json["status"], "succeeded");
    assert_eq!(json["amount"], 500);

    let (status, json) = send(
        &app,
        json_request(
            "POST",
            "/api/payments/refund",
            Some(&admin),
            json!({ "paymentIntentId": "pi_7", "amount": 200, "reason": "duplicate" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["amount"], 200);

    let (status, _) = send(
        &app,
        json_request("POST", "/api/payments/refund", Some(&admin), json!({ "paymentIntentId": "pi_7", "amount": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let calls = refunds.lock().unwrap();
    assert_eq!(
        *calls,
        vec![
            ("pi_7".to_string(), None, "requested_by_customer".to_string()),
            ("pi_7".to_string(), Some(200), "duplicate".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_webhook_confirms_once() {
    let (state, sent) = test_state();
    seed(&state, 10);
    insert_booking(&state, "b1", 2, BookingStatus::Pending);
    let app = app::router(state.clone());

    let (status, json) = send(&app, webhook_request("evt_1", "b1", 500)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["received"], true);
    assert_eq!(booking_status(&state, "b1"), BookingStatus::Confirmed);
    assert_eq!(sent.lock().unwrap().len(), 1);
    assert_eq!(sent.lock().unwrap()[0].to, "ana@example.com");

    let (status, json) = send(&app, webhook_request("evt_1", "b1", 500)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["duplicate"], true);
    assert_eq!(sent.lock().unwrap().len(), 1);

    let paid = bookings::get_booking(&state.db.lock().unwrap(), "b1").unwrap().unwrap().paid_amount;
    assert_eq!(paid, 500);
}

#[tokio::test]
async fn test_webhook_bad_signature_rejected() {
    let (state, _) = test_state();
    seed(&state, 10);
    insert_booking(&state, "b1", 2, BookingStatus::Pending);
    let app = app::router(state.clone());

    let req = Request::builder()
        .method("POST")
        .uri("/api/payments/webhook")
        .header("stripe-signature", format!("t={},v1=deadbeef", Utc::now().timestamp()))
        .body(Body::from(r#"{"id":"evt_x","type":"payment_intent.succeeded","data":{"object":{}}}"#))
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = Request::builder()
        .method("POST")
        .uri("/api/payments/webhook")
        .body(Body::from("{}"))
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(booking_status(&state, "b1"), BookingStatus::Pending);
}

#[tokio::test]
async fn test_webhook_over_capacity_leaves_booking_pending() {
    let (state, sent) = test_state();
    seed(&state, 10);
    insert_booking(&state, "b1", 8, BookingStatus::Confirmed);
    insert_booking(&state, "b2", 3, BookingStatus::Pending);
    let app = app::router(state.clone());

    let (status, _) = send(&app, webhook_request("evt_2", "b2", 500)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(booking_status(&state, "b2"), BookingStatus::Pending);
    assert!(sent.lock().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_confirmations_never_overbook() {
    let (state, _) = test_state();
    seed(&state, 10);
    let app = app::router(state.clone());

    let mut creates = vec![];
    for _ in 0..6 {
        let app = app.clone();
        creates.push(tokio::spawn(async move {
            send(&app, json_request("POST", "/api/bookings", None, booking_body(3))).await
        }));
    }
    let mut ids = vec![];
    for handle in creates {
        let (status, json) = handle.await.unwrap();
        assert_eq!(status, StatusCode::CREATED);
        ids.push(json["id"].as_str().unwrap().to_string());
    }

    let mut confirms = vec![];
    for (i, id) in ids.iter().enumerate() {
        let app = app.clone();
        let req = webhook_request(&format!("evt_c{i}"), id, 500);
        confirms.push(tokio::spawn(async move { send(&app, req).await }));
    }
    for handle in confirms {
        let (status, _) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
    }

    let confirmed = bookings::confirmed_attendees(&state.db.lock().unwrap(), "date-1", None).unwrap();
    assert_eq!(confirmed, 9);
}

// ── Auth ──

#[tokio::test]
async fn test_register_login_me() {
    let (state, _) = test_state();
    let app = app::router(state);

    let body = json!({ "name": "Marta", "email": "Marta@Example.com", "password": "montaña1" });
    let (status, json) = send(&app, json_request("POST", "/api/auth/register", None, body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["user"]["role"], "CLIENT");
    assert_eq!(json["user"]["email"], "marta@example.com");

    let (status, _) = send(&app, json_request("POST", "/api/auth/register", None, body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(
        &app,
        json_request("POST", "/api/auth/login", None, json!({ "email": "marta@example.com", "password": "montaña1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = json["token"].as_str().unwrap().to_string();

    let (status, json) = send(&app, get_request("/api/auth/me", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "Marta");
    assert!(json.get("passwordHash").is_none());

    let (status, _) = send(&app, get_request("/api/auth/me", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_locked_after_repeated_failures() {
    let (state, _) = test_state();
    token_for(&state, Role::Client);
    let app = app::router(state);

    for _ in 0..5 {
        let (status, _) = send(
            &app,
            json_request("POST", "/api/auth/login", None, json!({ "email": "client@cumbre.example", "password": "wrong" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, _) = send(
        &app,
        json_request("POST", "/api/auth/login", None, json!({ "email": "client@cumbre.example", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_failed_logins_all_counted() {
    let (state, _) = test_state();
    token_for(&state, Role::Client);
    let app = app::router(state.clone());

    let mut attempts = vec![];
    for _ in 0..4 {
        let app = app.clone();
        attempts.push(tokio::spawn(async move {
            send(
                &app,
                json_request("POST", "/api/auth/login", None, json!({ "email": "client@cumbre.example", "password": "wrong" })),
            )
            .await
        }));
    }
    for handle in attempts {
        let (status, _) = handle.await.unwrap();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let limit = &rate_limit::LOGIN_FAILURES;
    let failures = rate_limits::current_count(
        &state.db.lock().unwrap(),
        &rate_limit::key(limit, "client@cumbre.example"),
        limit.window_secs,
    )
    .unwrap();
    assert_eq!(failures, 4);

    let (status, _) = send(
        &app,
        json_request("POST", "/api/auth/login", None, json!({ "email": "client@cumbre.example", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_two_factor_login_flow() {
    let (state, _) = test_state();
    let token = token_for(&state, Role::Admin);
    let app = app::router(state);

    let (status, json) = send(&app, json_request("POST", "/api/auth/2fa/setup", Some(&token), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    let secret = json["secret"].as_str().unwrap().to_string();
    assert!(json["otpauthUrl"].as_str().unwrap().starts_with("otpauth://totp/"));

    let key = two_factor::base32_decode(&secret).unwrap();
    let code = two_factor::totp_at(&key, Utc::now().timestamp());

    let (status, _) = send(&app, json_request("POST", "/api/auth/2fa/verify", Some(&token), json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(
        &app,
        json_request("POST", "/api/auth/2fa/enable", Some(&token), json!({ "token": code })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let backup_codes = json["backupCodes"].as_array().unwrap();
    assert_eq!(backup_codes.len(), 10);
    let backup = backup_codes[0].as_str().unwrap().to_string();

    let credentials = json!({ "email": "admin@cumbre.example", "password": "secret123" });
    let (status, json) = send(&app, json_request("POST", "/api/auth/login", None, credentials.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["requires2FA"], true);

    let mut with_bad = credentials.clone();
    let bad = if code == "000000" { "111111" } else { "000000" };
    with_bad["token"] = json!(bad);
    let (status, _) = send(&app, json_request("POST", "/api/auth/login", None, with_bad)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut with_code = credentials;
    with_code["token"] = json!(code);
    let (status, json) = send(&app, json_request("POST", "/api/auth/login", None, with_code)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["token"].is_string());

    let (status, _) = send(&app, json_request("POST", "/api/auth/2fa/backup", Some(&token), json!({ "code": backup }))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, json_request("POST", "/api/auth/2fa/backup", Some(&token), json!({ "code": backup }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ── Contact & rate limits ──

#[tokio::test]
async fn test_contact_rate_limited_per_client() {
    let (state, sent) = test_state();
    let app = app::router(state);

    let contact = |ip: &str| {
        let mut req = json_request(
            "POST",
            "/api/contact",
            None,
            json!({
                "name": "Sofía",
                "email": "sofia@example.com",
                "message": "Quiero información sobre el Pico de Orizaba",
            }),
        );
        req.headers_mut().insert("x-forwarded-for", ip.parse().unwrap());
        req
    };

    for _ in 0..10 {
        let (status, json) = send(&app, contact("203.0.113.7")).await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(json["id"].is_string());
    }
    let (status, _) = send(&app, contact("203.0.113.7")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let (status, _) = send(&app, contact("198.51.100.4")).await;
    assert_eq!(status, StatusCode::CREATED);

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 11);
    assert_eq!(sent[0].to, "admin@cumbre.example");
    assert_eq!(sent[0].reply_to.as_deref(), Some("sofia@example.com"));
}

// ── Admin ──

#[tokio::test]
async fn test_admin_experience_crud() {
    let (state, _) = test_state();
    seed(&state, 10);
    let admin = token_for(&state, Role::Admin);
    let app = app::router(state);

    let body = json!({
        "title": "Pico de Orizaba",
        "slug": "nevado",
        "description": "Expedición de tres días",
        "content": "Itinerario",
        "category": "EXPEDICION",
        "difficulty": "AVANZADO",
        "duration": "3 días",
        "price": 8500,
    });
    let (status, _) = send(&app, json_request("POST", "/api/admin/experiences", Some(&admin), body.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut fresh = body;
    fresh["slug"] = json!("pico-de-orizaba");
    let (status, json) = send(&app, json_request("POST", "/api/admin/experiences", Some(&admin), fresh)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["isActive"], true);
    let id = json["id"].as_str().unwrap().to_string();

    let (status, json) = send(
        &app,
        json_request("PUT", &format!("/api/admin/experiences/{id}"), Some(&admin), json!({ "price": 9000 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["price"], 9000);
    assert_eq!(json["title"], "Pico de Orizaba");

    let (status, json) = send(&app, get_request("/api/admin/experiences", Some(&admin))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 2);

    let (status, _) = send(&app, json_request("DELETE", &format!("/api/admin/experiences/{id}"), Some(&admin), json!({}))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, json_request("DELETE", &format!("/api/admin/experiences/{id}"), Some(&admin), json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_date_capacity_cannot_drop_below_confirmed() {
    let (state, _) = test_state();
    seed(&state, 10);
    insert_booking(&state, "b1", 8, BookingStatus::Confirmed);
    let admin = token_for(&state, Role::Admin);
    let app = app::router(state);

    let (status, _) = send(
        &app,
        json_request("PUT", "/api/admin/experience-dates/date-1", Some(&admin), json!({ "maxAttendees": 6 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(
        &app,
        json_request("PUT", "/api/admin/experience-dates/date-1", Some(&admin), json!({ "maxAttendees": 8 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["maxAttendees"], 8);

    let start = Utc::now().date_naive() + Duration::days(60);
    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/api/admin/experience-dates",
            Some(&admin),
            json!({
                "experienceId": "exp-1",
                "startDate": start.to_string(),
                "endDate": (start - Duration::days(1)).to_string(),
                "maxAttendees": 8,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_cannot_delete_dates_with_bookings() {
    let (state, _) = test_state();
    seed(&state, 10);
    insert_booking(&state, "b1", 2, BookingStatus::Confirmed);
    let admin = token_for(&state, Role::Admin);
    let app = app::router(state.clone());

    let (status, _) = send(
        &app,
        json_request("DELETE", "/api/admin/experience-dates/date-1", Some(&admin), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        json_request("DELETE", "/api/admin/experiences/exp-1", Some(&admin), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(booking_status(&state, "b1"), BookingStatus::Confirmed);
    let (_, json) = send(&app, get_request("/api/admin/experiences", Some(&admin))).await;
    assert_eq!(json[0]["bookingCount"], 1);
    assert_eq!(json[0]["dates"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_drafts_hidden_from_public_blog() {
    let (state, _) = test_state();
    let admin = token_for(&state, Role::Admin);
    let app = app::router(state);

    let (status, json) = send(
        &app,
        json_request(
            "POST",
            "/api/admin/posts",
            Some(&admin),
            json!({
                "title": "Primer ascenso",
                "slug": "primer-ascenso",
                "content": "Crónica",
                "excerpt": "Resumen",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["isPublished"], false);
    let id = json["id"].as_str().unwrap().to_string();

    let (_, json) = send(&app, get_request("/api/blog/posts", None)).await;
    assert_eq!(json["total"], 0);
    let (status, _) = send(&app, get_request("/api/blog/posts/primer-ascenso", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        json_request("PUT", &format!("/api/admin/posts/{id}"), Some(&admin), json!({ "isPublished": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = send(&app, get_request("/api/blog/posts", None)).await;
    assert_eq!(json["total"], 1);
    assert_eq!(json["hasMore"], false);
    let (status, _) = send(&app, get_request("/api/blog/posts/primer-ascenso", None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_dashboard_counts_confirmed_revenue() {
    let (state, _) = test_state();
    seed(&state, 10);
    insert_booking(&state, "b1", 2, BookingStatus::Pending);
    let admin = token_for(&state, Role::Admin);
    let app = app::router(state);

    send(&app, webhook_request("evt_d", "b1", 750)).await;

    let (status, json) = send(&app, get_request("/api/admin/dashboard", Some(&admin))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["totalExperiences"], 1);
    assert_eq!(json["totalBookings"], 1);
    assert_eq!(json["totalRevenue"], 750);
    assert_eq!(json["pendingBookings"], 0);
}

// ── Instagram ──

#[tokio::test]
async fn test_instagram_sync_keeps_images_only() {
    let (state, _) = test_state();
    let admin = token_for(&state, Role::Admin);
    let app = app::router(state);

    let (status, json) = send(&app, json_request("POST", "/api/instagram/sync", Some(&admin), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["synced"], 2);

    // a second sync upserts instead of duplicating
    send(&app, json_request("POST", "/api/instagram/sync", Some(&admin), json!({}))).await;

    let (status, json) = send(&app, get_request("/api/instagram/posts", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 2);
}
