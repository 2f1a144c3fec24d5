use rusqlite::{params, Connection};

use super::{fmt_ts, parse_ts};
use crate::models::InstagramPost;

pub fn upsert_post(conn: &Connection, post: &InstagramPost) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO instagram_posts (id, instagram_id, image_url, caption, permalink, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(instagram_id) DO UPDATE SET
           image_url = excluded.image_url,
           caption = excluded.caption,
           permalink = excluded.permalink,
           timestamp = excluded.timestamp",
        params![
            post.id,
            post.instagram_id,
            post.image_url,
            post.caption,
            post.permalink,
            fmt_ts(&post.timestamp),
        ],
    )?;
    Ok(())
}

pub fn list_posts(conn: &Connection, limit: i64) -> anyhow::Result<Vec<InstagramPost>> {
    let mut stmt = conn.prepare(
        "SELECT id, instagram_id, image_url, caption, permalink, timestamp
         FROM instagram_posts ORDER BY timestamp DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| {
        let timestamp: String = row.get(5)?;
        Ok(InstagramPost {
            id: row.get(0)?,
            instagram_id: row.get(1)?,
            image_url: row.get(2)?,
            caption: row.get(3)?,
            permalink: row.get(4)?,
            timestamp: parse_ts(&timestamp),
        })
    })?;

    let mut posts = vec![];
    for row in rows {
        posts.push(row?);
    }
    Ok(posts)
}

/// Deletes everything but the `keep` newest posts.
pub fn prune_posts(conn: &Connection, keep: i64) -> anyhow::Result<usize> {
    let count = conn.execute(
        "DELETE FROM instagram_posts WHERE id NOT IN (
             SELECT id FROM instagram_posts ORDER BY timestamp DESC LIMIT ?1
         )",
        params![keep],
    )?;
    Ok(count)
}
