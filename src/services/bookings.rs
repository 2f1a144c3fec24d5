use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior};
use uuid::Uuid;

use crate::db::queries::{bookings, experiences};
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus};
use crate::services::availability::{self, Capacity};

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub experience_id: String,
    pub experience_date_id: String,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: String,
    pub attendees: i64,
    pub notes: Option<String>,
}

#[derive(Debug)]
pub enum Confirmation {
    Confirmed(Booking),
    AlreadyConfirmed(Booking),
}

impl Confirmation {
    pub fn booking(&self) -> &Booking {
        match self {
            Confirmation::Confirmed(b) | Confirmation::AlreadyConfirmed(b) => b,
        }
    }

    pub fn into_booking(self) -> Booking {
        match self {
            Confirmation::Confirmed(b) | Confirmation::AlreadyConfirmed(b) => b,
        }
    }
}

/// Capacity check and insert in one IMMEDIATE transaction. Nothing is written
/// when the check fails.
pub fn create_booking(conn: &mut Connection, input: NewBooking) -> Result<Booking, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let experience = experiences::get_experience(&tx, &input.experience_id)?
        .ok_or_else(|| AppError::NotFound("experience not found".to_string()))?;

    let (date, _) = availability::check_availability(&tx, &input.experience_date_id, input.attendees)?;
    if date.experience_id != experience.id {
        return Err(AppError::BadRequest(
            "date does not belong to experience".to_string(),
        ));
    }

    let now = Utc::now().naive_utc();
    let booking = Booking {
        id: Uuid::new_v4().to_string(),
        experience_id: experience.id.clone(),
        experience_date_id: date.id.clone(),
        client_name: input.client_name,
        client_email: input.client_email,
        client_phone: input.client_phone,
        attendees: input.attendees,
        notes: input.notes,
        total_amount: date.price_per_person(&experience) * input.attendees,
        paid_amount: 0,
        payment_intent_id: None,
        status: BookingStatus::Pending,
        created_at: now,
        updated_at: now,
    };
    bookings::insert_booking(&tx, &booking)?;
    tx.commit()?;

    tracing::info!(
        booking_id = %booking.id,
        date_id = %booking.experience_date_id,
        attendees = booking.attendees,
        "booking created"
    );
    Ok(booking)
}

/// Moves a PENDING booking to CONFIRMED if its attendees still fit next to
/// the other confirmed bookings of the date. Callers own the transaction.
pub fn confirm_in(
    conn: &Connection,
    id: &str,
    payment_intent_id: Option<&str>,
    paid_amount: i64,
) -> Result<Confirmation, AppError> {
    let booking = bookings::get_booking(conn, id)?
        .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;

    if booking.status == BookingStatus::Confirmed {
        return Ok(Confirmation::AlreadyConfirmed(booking));
    }
    if !booking.status.can_transition_to(BookingStatus::Confirmed) {
        return Err(AppError::BadRequest(format!(
            "booking is {} and cannot be confirmed",
            booking.status
        )));
    }

    let date = experiences::get_date(conn, &booking.experience_date_id)?
        .ok_or_else(|| AppError::NotFound("date not found".to_string()))?;
    let capacity = Capacity {
        max_attendees: date.max_attendees,
        confirmed: bookings::confirmed_attendees(conn, &date.id, Some(&booking.id))?,
    };
    if !capacity.fits(booking.attendees) {
        return Err(AppError::Capacity {
            available_spots: capacity.available_spots(),
        });
    }

    bookings::mark_confirmed(conn, &booking.id, payment_intent_id, paid_amount)?;
    let confirmed = bookings::get_booking(conn, &booking.id)?
        .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;
    Ok(Confirmation::Confirmed(confirmed))
}

pub fn confirm_booking(
    conn: &mut Connection,
    id: &str,
    payment_intent_id: Option<&str>,
    paid_amount: i64,
) -> Result<Confirmation, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let confirmation = confirm_in(&tx, id, payment_intent_id, paid_amount)?;
    tx.commit()?;
    Ok(confirmation)
}

pub fn cancel_booking(conn: &mut Connection, id: &str) -> Result<Booking, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let booking = bookings::get_booking(&tx, id)?
        .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;
    if booking.status == BookingStatus::Cancelled {
        return Ok(booking);
    }
    if !booking.status.can_transition_to(BookingStatus::Cancelled) {
        return Err(AppError::BadRequest(format!(
            "booking is {} and cannot be cancelled",
            booking.status
        )));
    }

    bookings::update_booking_status(&tx, id, BookingStatus::Cancelled)?;
    let cancelled = bookings::get_booking(&tx, id)?
        .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;
    tx.commit()?;

    tracing::info!(booking_id = %id, "booking cancelled");
    Ok(cancelled)
}
