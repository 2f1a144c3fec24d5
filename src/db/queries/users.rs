use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{fmt_ts, parse_ts};
use crate::models::{Role, User};

const COLUMNS: &str = "id, name, email, password_hash, role, two_factor_enabled, two_factor_secret, \
     backup_codes, created_at";

pub fn create_user(conn: &Connection, user: &User) -> anyhow::Result<()> {
    conn.execute(
        &format!("INSERT INTO users ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
        params![
            user.id,
            user.name,
            user.email,
            user.password_hash,
            user.role.as_str(),
            user.two_factor_enabled,
            user.two_factor_secret,
            serde_json::to_string(&user.backup_codes)?,
            fmt_ts(&user.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &str) -> anyhow::Result<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            parse_row,
        )
        .optional()?;
    Ok(user)
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> anyhow::Result<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM users WHERE email = ?1 COLLATE NOCASE"),
            params![email],
            parse_row,
        )
        .optional()?;
    Ok(user)
}

/// Stores a fresh secret and leaves 2FA disabled until the user proves it works.
pub fn set_two_factor_secret(conn: &Connection, id: &str, secret: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE users SET two_factor_secret = ?1, two_factor_enabled = 0 WHERE id = ?2",
        params![secret, id],
    )?;
    Ok(count > 0)
}

pub fn enable_two_factor(conn: &Connection, id: &str, backup_codes: &[String]) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE users SET two_factor_enabled = 1, backup_codes = ?1 WHERE id = ?2",
        params![serde_json::to_string(backup_codes)?, id],
    )?;
    Ok(count > 0)
}

pub fn disable_two_factor(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE users SET two_factor_enabled = 0, two_factor_secret = NULL, backup_codes = '[]'
         WHERE id = ?1",
        params![id],
    )?;
    Ok(count > 0)
}

pub fn set_backup_codes(conn: &Connection, id: &str, codes: &[String]) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE users SET backup_codes = ?1 WHERE id = ?2",
        params![serde_json::to_string(codes)?, id],
    )?;
    Ok(())
}

pub fn count_admins(conn: &Connection) -> anyhow::Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM users WHERE role = 'ADMIN'", [], |row| {
        row.get(0)
    })?;
    Ok(count)
}

fn parse_row(row: &Row) -> rusqlite::Result<User> {
    let role: String = row.get(4)?;
    let backup_codes: String = row.get(7)?;
    let created_at: String = row.get(8)?;

    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        role: Role::parse(&role),
        two_factor_enabled: row.get(5)?,
        two_factor_secret: row.get(6)?,
        backup_codes: serde_json::from_str(&backup_codes).unwrap_or_default(),
        created_at: parse_ts(&created_at),
    })
}
