use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{fmt_ts, known, now_ts, parse_date, parse_ts};
use crate::models::{Booking, BookingDetails, BookingStatus, DateSummary, ExperienceSummary};

const BOOKING_COLUMNS: &str = "b.id, b.experience_id, b.experience_date_id, b.client_name, b.client_email, \
     b.client_phone, b.attendees, b.notes, b.total_amount, b.paid_amount, b.payment_intent_id, \
     b.status, b.created_at, b.updated_at";

const DETAIL_JOIN: &str = "FROM bookings b
     JOIN experiences e ON e.id = b.experience_id
     JOIN experience_dates d ON d.id = b.experience_date_id";

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, experience_id, experience_date_id, client_name, client_email,
            client_phone, attendees, notes, total_amount, paid_amount, payment_intent_id, status,
            created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            booking.id,
            booking.experience_id,
            booking.experience_date_id,
            booking.client_name,
            booking.client_email,
            booking.client_phone,
            booking.attendees,
            booking.notes,
            booking.total_amount,
            booking.paid_amount,
            booking.payment_intent_id,
            booking.status.as_str(),
            fmt_ts(&booking.created_at),
            fmt_ts(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let booking = conn
        .query_row(
            &format!("SELECT {BOOKING_COLUMNS} FROM bookings b WHERE b.id = ?1"),
            params![id],
            parse_booking_row,
        )
        .optional()?;
    Ok(booking)
}

pub fn get_booking_details(conn: &Connection, id: &str) -> anyhow::Result<Option<BookingDetails>> {
    let details = conn
        .query_row(
            &format!(
                "SELECT {BOOKING_COLUMNS}, e.title, e.slug, d.start_date, d.end_date {DETAIL_JOIN}
                 WHERE b.id = ?1"
            ),
            params![id],
            parse_details_row,
        )
        .optional()?;
    Ok(details)
}

pub fn list_bookings(
    conn: &Connection,
    status: Option<BookingStatus>,
    experience_id: Option<&str>,
    limit: i64,
    offset: i64,
) -> anyhow::Result<(Vec<BookingDetails>, i64)> {
    let status = status.map(|s| s.as_str());

    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS}, e.title, e.slug, d.start_date, d.end_date {DETAIL_JOIN}
         WHERE (?1 IS NULL OR b.status = ?1) AND (?2 IS NULL OR b.experience_id = ?2)
         ORDER BY b.created_at DESC, b.rowid DESC
         LIMIT ?3 OFFSET ?4"
    ))?;
    let rows = stmt.query_map(
        params![status, experience_id, limit, offset],
        parse_details_row,
    )?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row?);
    }

    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings
         WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR experience_id = ?2)",
        params![status, experience_id],
        |row| row.get(0),
    )?;

    Ok((bookings, total))
}

pub fn recent_bookings(conn: &Connection, limit: i64) -> anyhow::Result<Vec<BookingDetails>> {
    let (bookings, _) = list_bookings(conn, None, None, limit, 0)?;
    Ok(bookings)
}

/// Sum of attendees over CONFIRMED bookings for a date, optionally leaving
/// one booking out of the total.
pub fn confirmed_attendees(
    conn: &Connection,
    experience_date_id: &str,
    excluding: Option<&str>,
) -> anyhow::Result<i64> {
    let total = conn.query_row(
        "SELECT COALESCE(SUM(attendees), 0) FROM bookings
         WHERE experience_date_id = ?1 AND status = 'CONFIRMED' AND (?2 IS NULL OR id != ?2)",
        params![experience_date_id, excluding],
        |row| row.get(0),
    )?;
    Ok(total)
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now_ts(), id],
    )?;
    Ok(count > 0)
}

pub fn mark_confirmed(
    conn: &Connection,
    id: &str,
    payment_intent_id: Option<&str>,
    paid_amount: i64,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = 'CONFIRMED',
            payment_intent_id = COALESCE(?1, payment_intent_id),
            paid_amount = ?2, updated_at = ?3
         WHERE id = ?4",
        params![payment_intent_id, paid_amount, now_ts(), id],
    )?;
    Ok(count > 0)
}

pub fn set_payment_intent(conn: &Connection, id: &str, intent_id: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET payment_intent_id = ?1, updated_at = ?2 WHERE id = ?3",
        params![intent_id, now_ts(), id],
    )?;
    Ok(count > 0)
}

fn parse_booking_row(row: &Row) -> rusqlite::Result<Booking> {
    let status: String = row.get(11)?;
    let created_at: String = row.get(12)?;
    let updated_at: String = row.get(13)?;

    Ok(Booking {
        id: row.get(0)?,
        experience_id: row.get(1)?,
        experience_date_id: row.get(2)?,
        client_name: row.get(3)?,
        client_email: row.get(4)?,
        client_phone: row.get(5)?,
        attendees: row.get(6)?,
        notes: row.get(7)?,
        total_amount: row.get(8)?,
        paid_amount: row.get(9)?,
        payment_intent_id: row.get(10)?,
        status: known(11, &status, BookingStatus::parse(&status))?,
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

fn parse_details_row(row: &Row) -> rusqlite::Result<BookingDetails> {
    let booking = parse_booking_row(row)?;
    let start_date: String = row.get(16)?;
    let end_date: String = row.get(17)?;

    Ok(BookingDetails {
        booking,
        experience: ExperienceSummary {
            title: row.get(14)?,
            slug: row.get(15)?,
        },
        experience_date: DateSummary {
            start_date: parse_date(&start_date)?,
            end_date: parse_date(&end_date)?,
        },
    })
}


#[cfg(test)]
mod tests {
    use super::fixtures::booking;
    use super::*;
    use crate::db;
    use crate::db::queries::experiences::fixtures::seed;

    #[test]
    fn test_confirmed_attendees_only_counts_confirmed() {
        let conn = db::init_db(":memory:").unwrap();
        seed(&conn, 10);
        insert_booking(&conn, &booking("b1", 3, BookingStatus::Confirmed)).unwrap();
        insert_booking(&conn, &booking("b2", 4, BookingStatus::Pending)).unwrap();
        insert_booking(&conn, &booking("b3", 2, BookingStatus::Cancelled)).unwrap();
        insert_booking(&conn, &booking("b4", 1, BookingStatus::Confirmed)).unwrap();

        assert_eq!(confirmed_attendees(&conn, "date-1", None).unwrap(), 4);
        assert_eq!(confirmed_attendees(&conn, "date-1", Some("b1")).unwrap(), 1);
    }

    #[test]
    fn test_mark_confirmed_keeps_existing_intent() {
        let conn = db::init_db(":memory:").unwrap();
        seed(&conn, 10);
        insert_booking(&conn, &booking("b1", 2, BookingStatus::Pending)).unwrap();
        set_payment_intent(&conn, "b1", "pi_123").unwrap();

        assert!(mark_confirmed(&conn, "b1", None, 500).unwrap());
        let b = get_booking(&conn, "b1").unwrap().unwrap();
        assert_eq!(b.status, BookingStatus::Confirmed);
        assert_eq!(b.paid_amount, 500);
        assert_eq!(b.payment_intent_id.as_deref(), Some("pi_123"));
    }

    #[test]
    fn test_list_bookings_filters_and_totals() {
        let conn = db::init_db(":memory:").unwrap();
        seed(&conn, 10);
        for i in 0..3 {
            insert_booking(&conn, &booking(&format!("p{i}"), 1, BookingStatus::Pending)).unwrap();
        }
        insert_booking(&conn, &booking("c1", 1, BookingStatus::Confirmed)).unwrap();

        let (page, total) = list_bookings(&conn, Some(BookingStatus::Pending), None, 2, 0).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(total, 3);
        assert_eq!(page[0].experience.slug, "nevado");

        let (all, total_all) = list_bookings(&conn, None, Some("exp-1"), 50, 0).unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(total_all, 4);
    }

    #[test]
    fn test_unknown_status_is_an_error() {
        let conn = db::init_db(":memory:").unwrap();
        seed(&conn, 10);
        insert_booking(&conn, &booking("b1", 2, BookingStatus::Cancelled)).unwrap();
        conn.execute("UPDATE bookings SET status = 'REFUNDED' WHERE id = 'b1'", [])
            .unwrap();

        assert!(get_booking(&conn, "b1").is_err());
        assert_eq!(confirmed_attendees(&conn, "date-1", None).unwrap(), 0);
    }

    #[test]
    fn test_get_booking_details_missing() {
        let conn = db::init_db(":memory:").unwrap();
        assert!(get_booking_details(&conn, "nope").unwrap().is_none());
    }
}
