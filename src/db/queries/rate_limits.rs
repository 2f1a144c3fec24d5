use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

fn window_start(window_secs: i64) -> i64 {
    let now = Utc::now().timestamp();
    now - now.rem_euclid(window_secs)
}

/// Counts one hit for `key` in the current fixed window and returns the new count.
pub fn increment(conn: &Connection, key: &str, window_secs: i64) -> anyhow::Result<i64> {
    let window = window_start(window_secs);

    conn.execute(
        "INSERT INTO rate_limits (key, window_start, hit_count)
         VALUES (?1, ?2, 1)
         ON CONFLICT(key, window_start) DO UPDATE SET hit_count = hit_count + 1",
        params![key, window],
    )?;

    let count: i64 = conn.query_row(
        "SELECT hit_count FROM rate_limits WHERE key = ?1 AND window_start = ?2",
        params![key, window],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn current_count(conn: &Connection, key: &str, window_secs: i64) -> anyhow::Result<i64> {
    let count = conn
        .query_row(
            "SELECT hit_count FROM rate_limits WHERE key = ?1 AND window_start = ?2",
            params![key, window_start(window_secs)],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(0);
    Ok(count)
}

pub fn reset(conn: &Connection, key: &str) -> anyhow::Result<()> {
    conn.execute("DELETE FROM rate_limits WHERE key = ?1", params![key])?;
    Ok(())
}

/// Drops windows older than `max_age_secs`.
pub fn cleanup_old_windows(conn: &Connection, max_age_secs: i64) -> anyhow::Result<usize> {
    let cutoff = Utc::now().timestamp() - max_age_secs;
    let count = conn.execute(
        "DELETE FROM rate_limits WHERE window_start < ?1",
        params![cutoff],
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn test_increment_and_reset() {
        let conn = db::init_db(":memory:").unwrap();
        assert_eq!(increment(&conn, "login:a@b.c", 900).unwrap(), 1);
        assert_eq!(increment(&conn, "login:a@b.c", 900).unwrap(), 2);
        assert_eq!(increment(&conn, "login:x@y.z", 900).unwrap(), 1);
        assert_eq!(current_count(&conn, "login:a@b.c", 900).unwrap(), 2);

        reset(&conn, "login:a@b.c").unwrap();
        assert_eq!(current_count(&conn, "login:a@b.c", 900).unwrap(), 0);
    }

    #[test]
    fn test_missing_key_counts_zero() {
        let conn = db::init_db(":memory:").unwrap();
        assert_eq!(current_count(&conn, "contact:10.0.0.1", 60).unwrap(), 0);
    }
}
