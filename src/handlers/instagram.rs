use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use super::extract::AdminUser;
use crate::db::queries::instagram;
use crate::errors::AppError;
use crate::models::InstagramPost;
use crate::services::instagram as sync;
use crate::state::AppState;

// GET /api/instagram/posts
#[derive(Deserialize)]
pub struct PostsQuery {
    pub limit: Option<i64>,
}

pub async fn list_posts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PostsQuery>,
) -> Result<Json<Vec<InstagramPost>>, AppError> {
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let db = state.db()?;
    Ok(Json(instagram::list_posts(&db, limit)?))
}

// POST /api/instagram/sync
pub async fn sync_posts(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let synced = sync::sync_posts(&state).await?;
    tracing::info!(synced, admin_id = %admin.id, "manual Instagram sync");
    Ok(Json(serde_json::json!({
        "message": "sync complete",
        "synced": synced,
    })))
}
