use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{fmt_ts, parse_ts};
use crate::models::Testimonial;

const COLUMNS: &str = "id, experience_id, name, content, rating, image_url, is_active, created_at";

pub fn create_testimonial(conn: &Connection, t: &Testimonial) -> anyhow::Result<()> {
    conn.execute(
        &format!("INSERT INTO testimonials ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
        params![
            t.id,
            t.experience_id,
            t.name,
            t.content,
            t.rating,
            t.image_url,
            t.is_active,
            fmt_ts(&t.created_at),
        ],
    )?;
    Ok(())
}

pub fn update_testimonial(conn: &Connection, t: &Testimonial) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE testimonials SET experience_id = ?1, name = ?2, content = ?3, rating = ?4,
            image_url = ?5, is_active = ?6
         WHERE id = ?7",
        params![
            t.experience_id,
            t.name,
            t.content,
            t.rating,
            t.image_url,
            t.is_active,
            t.id
        ],
    )?;
    Ok(count > 0)
}

pub fn delete_testimonial(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM testimonials WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

pub fn get_testimonial(conn: &Connection, id: &str) -> anyhow::Result<Option<Testimonial>> {
    let t = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM testimonials WHERE id = ?1"),
            params![id],
            parse_row,
        )
        .optional()?;
    Ok(t)
}

pub fn list_testimonials(conn: &Connection) -> anyhow::Result<Vec<Testimonial>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM testimonials ORDER BY created_at DESC, rowid DESC"
    ))?;
    let rows = stmt.query_map([], parse_row)?;

    let mut items = vec![];
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}

pub fn active_for_experience(
    conn: &Connection,
    experience_id: &str,
    limit: i64,
) -> anyhow::Result<Vec<Testimonial>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM testimonials
         WHERE experience_id = ?1 AND is_active = 1
         ORDER BY created_at DESC, rowid DESC
         LIMIT ?2"
    ))?;
    let rows = stmt.query_map(params![experience_id, limit], parse_row)?;

    let mut items = vec![];
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}

fn parse_row(row: &Row) -> rusqlite::Result<Testimonial> {
    let created_at: String = row.get(7)?;
    Ok(Testimonial {
        id: row.get(0)?,
        experience_id: row.get(1)?,
        name: row.get(2)?,
        content: row.get(3)?,
        rating: row.get(4)?,
        image_url: row.get(5)?,
        is_active: row.get(6)?,
        created_at: parse_ts(&created_at),
    })
}
