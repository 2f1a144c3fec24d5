pub mod migrations;
pub mod queries;

use anyhow::Context;
use rusqlite::Connection;

/// Opens (or creates) the SQLite file at `path` and brings the schema up to
/// date. `":memory:"` gives a throwaway database for tests.
pub fn init_db(path: &str) -> anyhow::Result<Connection> {
    let conn = Connection::open(path).with_context(|| format!("failed to open database at {path}"))?;

    // dates cascade with their experience; bookings block both deletes
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA foreign_keys=ON;
         PRAGMA busy_timeout=5000;",
    )
    .context("failed to set database pragmas")?;

    migrations::run_migrations(&conn)?;

    Ok(conn)
}
