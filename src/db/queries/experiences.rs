use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{fmt_date, fmt_ts, from_json_list, known, now_ts, parse_date, parse_ts, to_json_list, today};
use crate::models::{Difficulty, Experience, ExperienceCategory, ExperienceDate};

const EXPERIENCE_COLUMNS: &str = "id, title, slug, description, content, category, difficulty, duration, price, \
     includes, excludes, images, video_url, is_active, created_at, updated_at";

const DATE_COLUMNS: &str =
    "id, experience_id, start_date, end_date, max_attendees, price, is_active, created_at";

// ── Experiences ──

pub fn create_experience(conn: &Connection, exp: &Experience) -> anyhow::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO experiences ({EXPERIENCE_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
        ),
        params![
            exp.id,
            exp.title,
            exp.slug,
            exp.description,
            exp.content,
            exp.category.as_str(),
            exp.difficulty.as_str(),
            exp.duration,
            exp.price,
            to_json_list(&exp.includes)?,
            to_json_list(&exp.excludes)?,
            to_json_list(&exp.images)?,
            exp.video_url,
            exp.is_active,
            fmt_ts(&exp.created_at),
            fmt_ts(&exp.updated_at),
        ],
    )?;
    Ok(())
}

pub fn update_experience(conn: &Connection, exp: &Experience) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE experiences SET title = ?1, slug = ?2, description = ?3, content = ?4, category = ?5,
            difficulty = ?6, duration = ?7, price = ?8, includes = ?9, excludes = ?10, images = ?11,
            video_url = ?12, is_active = ?13, updated_at = ?14
         WHERE id = ?15",
        params![
            exp.title,
            exp.slug,
            exp.description,
            exp.content,
            exp.category.as_str(),
            exp.difficulty.as_str(),
            exp.duration,
            exp.price,
            to_json_list(&exp.includes)?,
            to_json_list(&exp.excludes)?,
            to_json_list(&exp.images)?,
            exp.video_url,
            exp.is_active,
            now_ts(),
            exp.id,
        ],
    )?;
    Ok(count > 0)
}

pub fn delete_experience(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM experiences WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

pub fn get_experience(conn: &Connection, id: &str) -> anyhow::Result<Option<Experience>> {
    let exp = conn
        .query_row(
            &format!("SELECT {EXPERIENCE_COLUMNS} FROM experiences WHERE id = ?1"),
            params![id],
            parse_experience_row,
        )
        .optional()?;
    Ok(exp)
}

pub fn get_experience_by_slug(conn: &Connection, slug: &str) -> anyhow::Result<Option<Experience>> {
    let exp = conn
        .query_row(
            &format!("SELECT {EXPERIENCE_COLUMNS} FROM experiences WHERE slug = ?1"),
            params![slug],
            parse_experience_row,
        )
        .optional()?;
    Ok(exp)
}

pub fn list_active_experiences(
    conn: &Connection,
    category: Option<ExperienceCategory>,
    difficulty: Option<Difficulty>,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<Experience>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EXPERIENCE_COLUMNS} FROM experiences
         WHERE is_active = 1
           AND (?1 IS NULL OR category = ?1)
           AND (?2 IS NULL OR difficulty = ?2)
         ORDER BY created_at DESC, rowid DESC
         LIMIT ?3 OFFSET ?4"
    ))?;

    let rows = stmt.query_map(
        params![
            category.map(|c| c.as_str()),
            difficulty.map(|d| d.as_str()),
            limit,
            offset
        ],
        parse_experience_row,
    )?;

    let mut experiences = vec![];
    for row in rows {
        experiences.push(row?);
    }
    Ok(experiences)
}

pub fn list_all_experiences(conn: &Connection) -> anyhow::Result<Vec<Experience>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EXPERIENCE_COLUMNS} FROM experiences ORDER BY created_at DESC, rowid DESC"
    ))?;
    let rows = stmt.query_map([], parse_experience_row)?;

    let mut experiences = vec![];
    for row in rows {
        experiences.push(row?);
    }
    Ok(experiences)
}

fn parse_experience_row(row: &Row) -> rusqlite::Result<Experience> {
    let category: String = row.get(5)?;
    let difficulty: String = row.get(6)?;
    let includes: String = row.get(9)?;
    let excludes: String = row.get(10)?;
    let images: String = row.get(11)?;
    let created_at: String = row.get(14)?;
    let updated_at: String = row.get(15)?;

    Ok(Experience {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        content: row.get(4)?,
        category: known(5, &category, ExperienceCategory::parse(&category))?,
        difficulty: known(6, &difficulty, Difficulty::parse(&difficulty))?,
        duration: row.get(7)?,
        price: row.get(8)?,
        includes: from_json_list(&includes),
        excludes: from_json_list(&excludes),
        images: from_json_list(&images),
        video_url: row.get(12)?,
        is_active: row.get(13)?,
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

// ── Experience Dates ──

pub fn create_date(conn: &Connection, date: &ExperienceDate) -> anyhow::Result<()> {
    conn.execute(
        &format!("INSERT INTO experience_dates ({DATE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
        params![
            date.id,
            date.experience_id,
            fmt_date(&date.start_date),
            fmt_date(&date.end_date),
            date.max_attendees,
            date.price,
            date.is_active,
            fmt_ts(&date.created_at),
        ],
    )?;
    Ok(())
}

pub fn update_date(conn: &Connection, date: &ExperienceDate) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE experience_dates SET experience_id = ?1, start_date = ?2, end_date = ?3,
            max_attendees = ?4, price = ?5, is_active = ?6
         WHERE id = ?7",
        params![
            date.experience_id,
            fmt_date(&date.start_date),
            fmt_date(&date.end_date),
            date.max_attendees,
            date.price,
            date.is_active,
            date.id,
        ],
    )?;
    Ok(count > 0)
}

pub fn delete_date(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM experience_dates WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

pub fn get_date(conn: &Connection, id: &str) -> anyhow::Result<Option<ExperienceDate>> {
    let date = conn
        .query_row(
            &format!("SELECT {DATE_COLUMNS} FROM experience_dates WHERE id = ?1"),
            params![id],
            parse_date_row,
        )
        .optional()?;
    Ok(date)
}

/// Active dates starting today or later, soonest first.
pub fn upcoming_dates(
    conn: &Connection,
    experience_id: &str,
    limit: Option<i64>,
) -> anyhow::Result<Vec<ExperienceDate>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DATE_COLUMNS} FROM experience_dates
         WHERE experience_id = ?1 AND is_active = 1 AND start_date >= ?2
         ORDER BY start_date ASC
         LIMIT ?3"
    ))?;
    let rows = stmt.query_map(
        params![experience_id, today(), limit.unwrap_or(-1)],
        parse_date_row,
    )?;

    let mut dates = vec![];
    for row in rows {
        dates.push(row?);
    }
    Ok(dates)
}

pub fn all_dates(conn: &Connection, experience_id: &str) -> anyhow::Result<Vec<ExperienceDate>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DATE_COLUMNS} FROM experience_dates WHERE experience_id = ?1 ORDER BY start_date ASC"
    ))?;
    let rows = stmt.query_map(params![experience_id], parse_date_row)?;

    let mut dates = vec![];
    for row in rows {
        dates.push(row?);
    }
    Ok(dates)
}

fn parse_date_row(row: &Row) -> rusqlite::Result<ExperienceDate> {
    let start_date: String = row.get(2)?;
    let end_date: String = row.get(3)?;
    let created_at: String = row.get(7)?;

    Ok(ExperienceDate {
        id: row.get(0)?,
        experience_id: row.get(1)?,
        start_date: parse_date(&start_date)?,
        end_date: parse_date(&end_date)?,
        max_attendees: row.get(4)?,
        price: row.get(5)?,
        is_active: row.get(6)?,
        created_at: parse_ts(&created_at),
    })
}

// ── Counts ──

pub fn count_active_testimonials(conn: &Connection, experience_id: &str) -> anyhow::Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM testimonials WHERE experience_id = ?1 AND is_active = 1",
        params![experience_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn count_testimonials(conn: &Connection, experience_id: &str) -> anyhow::Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM testimonials WHERE experience_id = ?1",
        params![experience_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn count_bookings(conn: &Connection, experience_id: &str) -> anyhow::Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM bookings WHERE experience_id = ?1",
        params![experience_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn count_date_bookings(conn: &Connection, date_id: &str) -> anyhow::Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM bookings WHERE experience_date_id = ?1",
        params![date_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{Duration, NaiveDate, Utc};
    use rusqlite::Connection;

    use super::*;

    pub fn experience(id: &str, slug: &str, price: i64) -> Experience {
        let now = Utc::now().naive_utc();
        Experience {
            id: id.to_string(),
            title: format!("Experience {id}"),
            slug: slug.to_string(),
            description: "A day on the mountain".to_string(),
            content: "Full itinerary".to_string(),
            category: ExperienceCategory::Iniciacion,
            difficulty: Difficulty::Principiante,
            duration: "1 day".to_string(),
            price,
            includes: vec!["Guide".to_string()],
            excludes: vec![],
            images: vec![],
            video_url: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn date(id: &str, experience_id: &str, max_attendees: i64) -> ExperienceDate {
        let start: NaiveDate = Utc::now().date_naive() + Duration::days(30);
        ExperienceDate {
            id: id.to_string(),
            experience_id: experience_id.to_string(),
            start_date: start,
            end_date: start + Duration::days(1),
            max_attendees,
            price: None,
            is_active: true,
            created_at: Utc::now().naive_utc(),
        }
    }

    /// One experience `exp-1` priced 1000 with one date `date-1` of the given capacity.
    pub fn seed(conn: &Connection, max_attendees: i64) {
        create_experience(conn, &experience("exp-1", "nevado", 1000)).unwrap();
        create_date(conn, &date("date-1", "exp-1", max_attendees)).unwrap();
    }
}
