use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid data")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    BadRequest(String),

    #[error("not enough spots available")]
    Capacity { available_spots: i64 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("two-factor token required")]
    TwoFactorRequired,

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("payment provider error: {0}")]
    Payment(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Request bodies are camelCase on the wire; `client_email` -> `clientEmail`.
fn wire_name(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| FieldError {
                    field: wire_name(&field),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));
        AppError::Validation(details)
    }
}

impl AppError {
    /// UNIQUE violations become a 400 with `message`; anything else stays internal.
    pub fn from_unique(err: anyhow::Error, message: &str) -> Self {
        match err.downcast_ref::<rusqlite::Error>() {
            Some(e) if crate::db::queries::is_unique_violation(e) => {
                AppError::BadRequest(message.to_string())
            }
            _ => AppError::Internal(err),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Capacity { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::TwoFactorRequired => StatusCode::FORBIDDEN,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Payment(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            AppError::Validation(details) => {
                serde_json::json!({ "error": self.to_string(), "details": details })
            }
            AppError::Capacity { available_spots } => serde_json::json!({
                "error": self.to_string(),
                "availableSpots": available_spots,
            }),
            AppError::TwoFactorRequired => {
                serde_json::json!({ "error": "2FA required", "requires2FA": true })
            }
            AppError::Payment(_) | AppError::Database(_) | AppError::Internal(_) => {
                tracing::error!(error = %self, "request failed");
                serde_json::json!({ "error": "internal server error" })
            }
            _ => serde_json::json!({ "error": self.to_string() }),
        };

        (status, axum::Json(body)).into_response()
    }
}
