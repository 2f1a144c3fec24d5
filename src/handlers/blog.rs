use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries::blog;
use crate::errors::AppError;
use crate::models::{CategoryWithCount, Post};
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostsPage {
    pub posts: Vec<Post>,
    pub total: i64,
    pub has_more: bool,
}

// GET /api/blog/posts
// Drafts never show up here; the admin listing has them.
#[derive(Deserialize)]
pub struct PostsQuery {
    pub category: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_posts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PostsQuery>,
) -> Result<Json<PostsPage>, AppError> {
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let offset = query.offset.unwrap_or(0).max(0);

    let (posts, total) = {
        let db = state.db()?;
        blog::list_posts(&db, Some(true), query.category.as_deref(), limit, offset)?
    };

    Ok(Json(PostsPage {
        has_more: offset + limit < total,
        posts,
        total,
    }))
}

// GET /api/blog/posts/:slug
pub async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<Post>, AppError> {
    let post = {
        let db = state.db()?;
        blog::get_post_by_slug(&db, &slug)?
    };

    match post {
        Some(post) if post.is_published => Ok(Json(post)),
        _ => Err(AppError::NotFound("post not found".to_string())),
    }
}

// GET /api/blog/categories
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CategoryWithCount>>, AppError> {
    let db = state.db()?;
    Ok(Json(blog::list_categories(&db)?))
}

// GET /api/blog/featured
pub async fn featured_posts(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Post>>, AppError> {
    let db = state.db()?;
    let (posts, _) = blog::list_posts(&db, Some(true), None, 3, 0)?;
    Ok(Json(posts))
}
