use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::extract::{AdminUser, ValidJson};
use crate::db::queries::bookings;
use crate::errors::AppError;
use crate::models::{BookingDetails, BookingStatus};
use crate::services::bookings::{self as booking_service, Confirmation, NewBooking};
use crate::services::email;
use crate::state::AppState;

fn load_details(state: &AppState, id: &str) -> Result<BookingDetails, AppError> {
    let db = state.db()?;
    bookings::get_booking_details(&db, id)?
        .ok_or_else(|| AppError::NotFound("booking not found".to_string()))
}

// POST /api/bookings
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateBookingRequest {
    #[validate(length(min = 1, message = "experienceId is required"))]
    pub experience_id: String,
    #[validate(length(min = 1, message = "experienceDateId is required"))]
    pub experience_date_id: String,
    #[validate(length(min = 2, message = "name must have at least 2 characters"))]
    pub client_name: String,
    #[validate(email(message = "invalid email"))]
    pub client_email: String,
    #[validate(length(min = 10, message = "phone must have at least 10 characters"))]
    pub client_phone: String,
    #[validate(range(min = 1, max = 12, message = "attendees must be between 1 and 12"))]
    pub attendees: i64,
    pub notes: Option<String>,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingDetails>), AppError> {
    let input = NewBooking {
        experience_id: req.experience_id,
        experience_date_id: req.experience_date_id,
        client_name: req.client_name.trim().to_string(),
        client_email: req.client_email.trim().to_string(),
        client_phone: req.client_phone.trim().to_string(),
        attendees: req.attendees,
        notes: req.notes.filter(|n| !n.trim().is_empty()),
    };

    let details = {
        let mut db = state.db()?;
        let booking = booking_service::create_booking(&mut db, input)?;
        bookings::get_booking_details(&db, &booking.id)?
            .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?
    };

    Ok((StatusCode::CREATED, Json(details)))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BookingDetails>, AppError> {
    Ok(Json(load_details(&state, &id)?))
}

// PUT /api/bookings/:id/confirm
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfirmBookingRequest {
    #[serde(alias = "stripePaymentId")]
    pub payment_intent_id: Option<String>,
    pub paid_amount: Option<i64>,
}

pub async fn confirm_booking(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    body: Option<Json<ConfirmBookingRequest>>,
) -> Result<Json<BookingDetails>, AppError> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let paid_amount = req.paid_amount.unwrap_or(0);
    if paid_amount < 0 {
        return Err(AppError::BadRequest("paidAmount cannot be negative".to_string()));
    }

    let confirmation = {
        let mut db = state.db()?;
        booking_service::confirm_booking(&mut db, &id, req.payment_intent_id.as_deref(), paid_amount)?
    };

    let details = load_details(&state, &id)?;
    if let Confirmation::Confirmed(_) = confirmation {
        tracing::info!(booking_id = %id, admin_id = %admin.id, "booking confirmed manually");
        email::send_booking_confirmation(state.mailer.as_ref(), &details).await;
    }

    Ok(Json(details))
}

// PUT /api/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<BookingDetails>, AppError> {
    {
        let mut db = state.db()?;
        booking_service::cancel_booking(&mut db, &id)?;
    }
    tracing::info!(booking_id = %id, admin_id = %admin.id, "cancel requested by admin");

    Ok(Json(load_details(&state, &id)?))
}

// GET /api/bookings
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub experience_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingsPage {
    pub bookings: Vec<BookingDetails>,
    pub total: i64,
    pub has_more: bool,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<BookingsPage>, AppError> {
    let status = query
        .status
        .as_deref()
        .map(|s| {
            BookingStatus::parse(s).ok_or_else(|| AppError::BadRequest(format!("invalid status: {s}")))
        })
        .transpose()?;
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let offset = query.offset.unwrap_or(0).max(0);

    let (items, total) = {
        let db = state.db()?;
        bookings::list_bookings(&db, status, query.experience_id.as_deref(), limit, offset)?
    };

    Ok(Json(BookingsPage {
        has_more: offset + (items.len() as i64) < total,
        bookings: items,
        total,
    }))
}
