use rusqlite::{params, Connection};

use crate::models::EventOutcome;

/// Claims an event id in the ledger. Returns `false` when the id was already
/// recorded, in which case the caller must not process it again.
pub fn claim_event(
    conn: &Connection,
    event_id: &str,
    event_type: &str,
    booking_id: Option<&str>,
) -> anyhow::Result<bool> {
    let inserted = conn.execute(
        "INSERT INTO payment_events (event_id, event_type, booking_id, outcome)
         VALUES (?1, ?2, ?3, 'processing')
         ON CONFLICT(event_id) DO NOTHING",
        params![event_id, event_type, booking_id],
    )?;
    Ok(inserted > 0)
}

pub fn record_outcome(
    conn: &Connection,
    event_id: &str,
    outcome: EventOutcome,
) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE payment_events SET outcome = ?1 WHERE event_id = ?2",
        params![outcome.as_str(), event_id],
    )?;
    Ok(())
}

pub fn get_outcome(conn: &Connection, event_id: &str) -> anyhow::Result<Option<String>> {
    let result = conn.query_row(
        "SELECT outcome FROM payment_events WHERE event_id = ?1",
        params![event_id],
        |row| row.get(0),
    );

    match result {
        Ok(outcome) => Ok(Some(outcome)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
