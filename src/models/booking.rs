use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub experience_id: String,
    pub experience_date_id: String,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: String,
    pub attendees: i64,
    pub notes: Option<String>,
    pub total_amount: i64,
    pub paid_amount: i64,
    pub payment_intent_id: Option<String>,
    pub status: BookingStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Completed => "COMPLETED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Some(BookingStatus::Pending),
            "CONFIRMED" => Some(BookingStatus::Confirmed),
            "CANCELLED" => Some(BookingStatus::Cancelled),
            "COMPLETED" => Some(BookingStatus::Completed),
            _ => None,
        }
    }

    /// Nothing ever moves back to `Pending`; `Cancelled` and `Completed` are terminal.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
                | (BookingStatus::Confirmed, BookingStatus::Cancelled)
                | (BookingStatus::Confirmed, BookingStatus::Completed)
        )
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Booking joined with the experience title/slug and the date range it belongs to.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetails {
    #[serde(flatten)]
    pub booking: Booking,
    pub experience: ExperienceSummary,
    pub experience_date: DateSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceSummary {
    pub title: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateSummary {
    pub start_date: chrono::NaiveDate,
    pub end_date: chrono::NaiveDate,
}
