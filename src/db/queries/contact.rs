use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{fmt_ts, known, parse_ts};
use crate::models::{ContactForm, ContactKind};

const COLUMNS: &str = "id, kind, name, email, phone, message, date_range, mountain_type, experience, \
     budget, is_read, created_at";

pub fn insert_contact(conn: &Connection, form: &ContactForm) -> anyhow::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO contact_forms ({COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ),
        params![
            form.id,
            form.kind.as_str(),
            form.name,
            form.email,
            form.phone,
            form.message,
            form.date_range,
            form.mountain_type,
            form.experience,
            form.budget,
            form.is_read,
            fmt_ts(&form.created_at),
        ],
    )?;
    Ok(())
}

pub fn list_contacts(
    conn: &Connection,
    kind: Option<ContactKind>,
    is_read: Option<bool>,
    limit: i64,
    offset: i64,
) -> anyhow::Result<(Vec<ContactForm>, i64)> {
    let kind = kind.map(|k| k.as_str());
    let filter = "WHERE (?1 IS NULL OR kind = ?1) AND (?2 IS NULL OR is_read = ?2)";

    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM contact_forms {filter}
         ORDER BY created_at DESC, rowid DESC LIMIT ?3 OFFSET ?4"
    ))?;
    let rows = stmt.query_map(params![kind, is_read, limit, offset], parse_row)?;

    let mut contacts = vec![];
    for row in rows {
        contacts.push(row?);
    }

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM contact_forms {filter}"),
        params![kind, is_read],
        |row| row.get(0),
    )?;

    Ok((contacts, total))
}

pub fn mark_read(conn: &Connection, id: &str) -> anyhow::Result<Option<ContactForm>> {
    let count = conn.execute(
        "UPDATE contact_forms SET is_read = 1 WHERE id = ?1",
        params![id],
    )?;
    if count == 0 {
        return Ok(None);
    }

    let form = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM contact_forms WHERE id = ?1"),
            params![id],
            parse_row,
        )
        .optional()?;
    Ok(form)
}

fn parse_row(row: &Row) -> rusqlite::Result<ContactForm> {
    let kind: String = row.get(1)?;
    let created_at: String = row.get(11)?;

    Ok(ContactForm {
        id: row.get(0)?,
        kind: known(1, &kind, ContactKind::parse(&kind))?,
        name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        message: row.get(5)?,
        date_range: row.get(6)?,
        mountain_type: row.get(7)?,
        experience: row.get(8)?,
        budget: row.get(9)?,
        is_read: row.get(10)?,
        created_at: parse_ts(&created_at),
    })
}
