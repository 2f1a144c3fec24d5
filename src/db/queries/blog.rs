use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{fmt_ts, now_ts, parse_ts};
use crate::models::{Category, CategoryRef, CategoryWithCount, Post};

const POST_SELECT: &str = "SELECT p.id, p.title, p.slug, p.content, p.excerpt, p.cover_image, p.category_id,
        p.is_published, p.created_at, p.updated_at, c.name, c.slug
     FROM posts p
     LEFT JOIN categories c ON c.id = p.category_id";

// ── Categories ──

pub fn create_category(conn: &Connection, category: &Category) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO categories (id, name, slug) VALUES (?1, ?2, ?3)",
        params![category.id, category.name, category.slug],
    )?;
    Ok(())
}

pub fn category_exists(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM categories WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn list_categories(conn: &Connection) -> anyhow::Result<Vec<CategoryWithCount>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.name, c.slug,
                (SELECT COUNT(*) FROM posts p WHERE p.category_id = c.id AND p.is_published = 1)
         FROM categories c
         ORDER BY c.name ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(CategoryWithCount {
            category: Category {
                id: row.get(0)?,
                name: row.get(1)?,
                slug: row.get(2)?,
            },
            published_post_count: row.get(3)?,
        })
    })?;

    let mut categories = vec![];
    for row in rows {
        categories.push(row?);
    }
    Ok(categories)
}

// ── Posts ──

pub fn create_post(conn: &Connection, post: &Post) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO posts (id, title, slug, content, excerpt, cover_image, category_id, is_published,
            created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            post.id,
            post.title,
            post.slug,
            post.content,
            post.excerpt,
            post.cover_image,
            post.category_id,
            post.is_published,
            fmt_ts(&post.created_at),
            fmt_ts(&post.updated_at),
        ],
    )?;
    Ok(())
}

pub fn update_post(conn: &Connection, post: &Post) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE posts SET title = ?1, slug = ?2, content = ?3, excerpt = ?4, cover_image = ?5,
            category_id = ?6, is_published = ?7, updated_at = ?8
         WHERE id = ?9",
        params![
            post.title,
            post.slug,
            post.content,
            post.excerpt,
            post.cover_image,
            post.category_id,
            post.is_published,
            now_ts(),
            post.id,
        ],
    )?;
    Ok(count > 0)
}

pub fn delete_post(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

pub fn get_post(conn: &Connection, id: &str) -> anyhow::Result<Option<Post>> {
    let post = conn
        .query_row(&format!("{POST_SELECT} WHERE p.id = ?1"), params![id], parse_post_row)
        .optional()?;
    Ok(post)
}

pub fn get_post_by_slug(conn: &Connection, slug: &str) -> anyhow::Result<Option<Post>> {
    let post = conn
        .query_row(
            &format!("{POST_SELECT} WHERE p.slug = ?1"),
            params![slug],
            parse_post_row,
        )
        .optional()?;
    Ok(post)
}

/// Posts filtered by publication flag and category slug, newest first, with
/// the unpaginated total.
pub fn list_posts(
    conn: &Connection,
    published: Option<bool>,
    category_slug: Option<&str>,
    limit: i64,
    offset: i64,
) -> anyhow::Result<(Vec<Post>, i64)> {
    let filter = "WHERE (?1 IS NULL OR p.is_published = ?1) AND (?2 IS NULL OR c.slug = ?2)";

    let mut stmt = conn.prepare(&format!(
        "{POST_SELECT} {filter} ORDER BY p.created_at DESC, p.rowid DESC LIMIT ?3 OFFSET ?4"
    ))?;
    let rows = stmt.query_map(
        params![published, category_slug, limit, offset],
        parse_post_row,
    )?;

    let mut posts = vec![];
    for row in rows {
        posts.push(row?);
    }

    let total: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM posts p LEFT JOIN categories c ON c.id = p.category_id {filter}"
        ),
        params![published, category_slug],
        |row| row.get(0),
    )?;

    Ok((posts, total))
}

fn parse_post_row(row: &Row) -> rusqlite::Result<Post> {
    let created_at: String = row.get(8)?;
    let updated_at: String = row.get(9)?;
    let category_name: Option<String> = row.get(10)?;
    let category_slug: Option<String> = row.get(11)?;

    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        content: row.get(3)?,
        excerpt: row.get(4)?,
        cover_image: row.get(5)?,
        category_id: row.get(6)?,
        is_published: row.get(7)?,
        category: category_name
            .zip(category_slug)
            .map(|(name, slug)| CategoryRef { name, slug }),
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}
