use rusqlite::{params, Connection};
use serde::Serialize;

use super::bookings::recent_bookings;
use crate::models::BookingDetails;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_experiences: i64,
    pub total_bookings: i64,
    pub total_revenue: i64,
    pub pending_bookings: i64,
    pub recent_bookings: Vec<BookingDetails>,
    pub popular_experiences: Vec<PopularExperience>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopularExperience {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub booking_count: i64,
}

pub fn get_dashboard_stats(conn: &Connection) -> anyhow::Result<DashboardStats> {
    let total_experiences: i64 = conn.query_row(
        "SELECT COUNT(*) FROM experiences WHERE is_active = 1",
        [],
        |row| row.get(0),
    )?;

    let total_bookings: i64 = conn.query_row("SELECT COUNT(*) FROM bookings", [], |row| row.get(0))?;

    let total_revenue: i64 = conn.query_row(
        "SELECT COALESCE(SUM(paid_amount), 0) FROM bookings WHERE status = 'CONFIRMED'",
        [],
        |row| row.get(0),
    )?;

    let pending_bookings: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings WHERE status = 'PENDING'",
        [],
        |row| row.get(0),
    )?;

    Ok(DashboardStats {
        total_experiences,
        total_bookings,
        total_revenue,
        pending_bookings,
        recent_bookings: recent_bookings(conn, 5)?,
        popular_experiences: popular_experiences(conn, 5)?,
    })
}

fn popular_experiences(conn: &Connection, limit: i64) -> anyhow::Result<Vec<PopularExperience>> {
    let mut stmt = conn.prepare(
        "SELECT e.id, e.title, e.slug, COUNT(b.id) AS booking_count
         FROM experiences e
         LEFT JOIN bookings b ON b.experience_id = e.id
         GROUP BY e.id
         ORDER BY booking_count DESC, e.created_at DESC
         LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| {
        Ok(PopularExperience {
            id: row.get(0)?,
            title: row.get(1)?,
            slug: row.get(2)?,
            booking_count: row.get(3)?,
        })
    })?;

    let mut items = vec![];
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::db::queries::bookings::{fixtures::booking, insert_booking, mark_confirmed};
    use crate::db::queries::experiences::fixtures::seed;
    use crate::models::BookingStatus;

    #[test]
    fn test_revenue_counts_only_confirmed() {
        let conn = db::init_db(":memory:").unwrap();
        seed(&conn, 10);
        insert_booking(&conn, &booking("b1", 2, BookingStatus::Pending)).unwrap();
        insert_booking(&conn, &booking("b2", 1, BookingStatus::Pending)).unwrap();
        mark_confirmed(&conn, "b1", Some("pi_1"), 700).unwrap();

        let stats = get_dashboard_stats(&conn).unwrap();
        assert_eq!(stats.total_bookings, 2);
        assert_eq!(stats.pending_bookings, 1);
        assert_eq!(stats.total_revenue, 700);
        assert_eq!(stats.popular_experiences[0].booking_count, 2);
        assert_eq!(stats.recent_bookings.len(), 2);
    }
}
