use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::extract::{AdminUser, ValidJson};
use crate::db::queries::contact;
use crate::errors::AppError;
use crate::models::{ContactForm, ContactKind};
use crate::services::email;
use crate::state::AppState;

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

// POST /api/contact
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactRequest {
    #[validate(length(min = 2, message = "name must have at least 2 characters"))]
    pub name: String,
    #[validate(email(message = "invalid email"))]
    pub email: String,
    pub phone: Option<String>,
    #[validate(length(min = 10, message = "message must have at least 10 characters"))]
    pub message: String,
    #[serde(rename = "type")]
    pub kind: Option<ContactKind>,
    pub date_range: Option<String>,
    pub mountain_type: Option<String>,
    pub experience: Option<String>,
    pub budget: Option<String>,
}

pub async fn submit_contact(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<ContactRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let form = ContactForm {
        id: Uuid::new_v4().to_string(),
        kind: req.kind.unwrap_or(ContactKind::General),
        name: req.name.trim().to_string(),
        email: req.email.trim().to_string(),
        phone: non_empty(req.phone),
        message: req.message.trim().to_string(),
        date_range: non_empty(req.date_range),
        mountain_type: non_empty(req.mountain_type),
        experience: non_empty(req.experience),
        budget: non_empty(req.budget),
        is_read: false,
        created_at: Utc::now().naive_utc(),
    };

    {
        let db = state.db()?;
        contact::insert_contact(&db, &form)?;
    }
    tracing::info!(contact_id = %form.id, kind = form.kind.as_str(), "contact form received");

    email::send_contact_notification(state.mailer.as_ref(), &state.config.admin_notify_email, &form)
        .await;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "form submitted",
            "id": form.id,
        })),
    ))
}

// GET /api/contact
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactsQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub is_read: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactsPage {
    pub contacts: Vec<ContactForm>,
    pub total: i64,
    pub has_more: bool,
}

pub async fn list_contacts(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(query): Query<ContactsQuery>,
) -> Result<Json<ContactsPage>, AppError> {
    let kind = query
        .kind
        .as_deref()
        .map(|k| ContactKind::parse(k).ok_or_else(|| AppError::BadRequest(format!("invalid type: {k}"))))
        .transpose()?;
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let offset = query.offset.unwrap_or(0).max(0);

    let (contacts, total) = {
        let db = state.db()?;
        contact::list_contacts(&db, kind, query.is_read, limit, offset)?
    };

    Ok(Json(ContactsPage {
        has_more: offset + limit < total,
        contacts,
        total,
    }))
}

// PUT /api/contact/:id/read
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Json<ContactForm>, AppError> {
    let db = state.db()?;
    contact::mark_read(&db, &id)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("contact form not found".to_string()))
}
