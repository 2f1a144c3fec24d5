use rusqlite::Connection;

use crate::db::queries::{bookings, experiences};
use crate::errors::AppError;
use crate::models::ExperienceDate;

#[derive(Debug, thiserror::Error)]
pub enum AvailabilityError {
    #[error("date not found")]
    NotFound,

    #[error("date not available")]
    Unavailable,

    #[error("only {available_spots} spots left")]
    InsufficientCapacity { available_spots: i64 },

    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

impl From<AvailabilityError> for AppError {
    fn from(err: AvailabilityError) -> Self {
        match err {
            AvailabilityError::NotFound => AppError::NotFound("date not found".to_string()),
            AvailabilityError::Unavailable => AppError::BadRequest("date not available".to_string()),
            AvailabilityError::InsufficientCapacity { available_spots } => {
                AppError::Capacity { available_spots }
            }
            AvailabilityError::Database(e) => AppError::Internal(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    pub max_attendees: i64,
    pub confirmed: i64,
}

impl Capacity {
    pub fn available_spots(&self) -> i64 {
        (self.max_attendees - self.confirmed).max(0)
    }

    pub fn fits(&self, attendees: i64) -> bool {
        attendees <= self.available_spots()
    }
}

pub fn capacity_of(conn: &Connection, date: &ExperienceDate) -> anyhow::Result<Capacity> {
    Ok(Capacity {
        max_attendees: date.max_attendees,
        confirmed: bookings::confirmed_attendees(conn, &date.id, None)?,
    })
}

/// `(available_spots, is_available)` for the public date listing.
pub fn date_availability(conn: &Connection, date: &ExperienceDate) -> anyhow::Result<(i64, bool)> {
    let spots = capacity_of(conn, date)?.available_spots();
    Ok((spots, date.is_active && spots > 0))
}

/// Read-only check that `attendees` more people fit on a date. To be
/// race-free it must run inside the same transaction as the write it guards.
pub fn check_availability(
    conn: &Connection,
    date_id: &str,
    attendees: i64,
) -> Result<(ExperienceDate, Capacity), AvailabilityError> {
    let date = experiences::get_date(conn, date_id)?.ok_or(AvailabilityError::NotFound)?;

    if !date.is_active {
        return Err(AvailabilityError::Unavailable);
    }

    let capacity = capacity_of(conn, &date)?;
    if !capacity.fits(attendees) {
        return Err(AvailabilityError::InsufficientCapacity {
            available_spots: capacity.available_spots(),
        });
    }

    Ok((date, capacity))
}
