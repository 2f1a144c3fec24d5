use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::extract::{AuthUser, ValidJson};
use crate::db::queries::{rate_limits, users};
use crate::errors::AppError;
use crate::models::{Role, User, UserProfile};
use crate::services::{auth, rate_limit, two_factor};
use crate::state::AppState;

#[derive(Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

// POST /api/auth/register
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct RegisterRequest {
    #[validate(length(min = 2, message = "name must have at least 2 characters"))]
    pub name: String,
    #[validate(email(message = "invalid email"))]
    pub email: String,
    #[validate(length(min = 6, message = "password must have at least 6 characters"))]
    pub password: String,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let user = User {
        id: Uuid::new_v4().to_string(),
        name: req.name.trim().to_string(),
        email: req.email.trim().to_lowercase(),
        password_hash: auth::hash_password(&req.password)?,
        role: Role::Client,
        two_factor_enabled: false,
        two_factor_secret: None,
        backup_codes: vec![],
        created_at: Utc::now().naive_utc(),
    };

    {
        let db = state.db()?;
        users::create_user(&db, &user).map_err(|e| AppError::from_unique(e, "email already registered"))?;
    }
    tracing::info!(user_id = %user.id, "user registered");

    let token = auth::issue_token(&user, &state.config.jwt_secret, state.config.jwt_expires_hours)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: UserProfile::from(&user),
        }),
    ))
}

// POST /api/auth/login
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct LoginRequest {
    #[validate(email(message = "invalid email"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
    /// TOTP code, required once 2FA is enabled.
    pub token: Option<String>,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let email = req.email.trim().to_lowercase();
    let limit = &rate_limit::LOGIN_FAILURES;

    let (blocked, stored) = {
        let db = state.db()?;
        (
            rate_limit::is_blocked(&db, limit, &email)?,
            users::get_user_by_email(&db, &email)?,
        )
    };
    if blocked {
        tracing::warn!(email = %email, "login blocked after repeated failures");
        return Err(AppError::RateLimited(limit.message.to_string()));
    }

    // argon2 runs without the connection lock
    let user = match stored {
        Some(user) if auth::verify_password(&req.password, &user.password_hash) => user,
        _ => {
            rate_limit::hit(&*state.db()?, limit, &email)?;
            tracing::warn!(email = %email, "failed login");
            return Err(AppError::Unauthorized);
        }
    };

    let db = state.db()?;
    if user.two_factor_enabled {
        let Some(token) = req.token.as_deref().filter(|t| !t.trim().is_empty()) else {
            return Err(AppError::TwoFactorRequired);
        };
        if !two_factor::verify_user_token(&db, &user.id, token, Utc::now().timestamp())? {
            rate_limit::hit(&db, limit, &email)?;
            return Err(AppError::Unauthorized);
        }
    }

    rate_limits::reset(&db, &rate_limit::key(limit, &email))?;
    drop(db);

    let token = auth::issue_token(&user, &state.config.jwt_secret, state.config.jwt_expires_hours)?;
    tracing::info!(user_id = %user.id, "user logged in");
    Ok(Json(AuthResponse {
        token,
        user: UserProfile::from(&user),
    }))
}

fn load_user(state: &AppState, id: &str) -> Result<User, AppError> {
    let db = state.db()?;
    users::get_user(&db, id)?.ok_or(AppError::Unauthorized)
}

// GET /api/auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> Result<Json<UserProfile>, AppError> {
    let user = load_user(&state, &auth_user.id)?;
    Ok(Json(UserProfile::from(&user)))
}

// ── Two-factor ──

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupResponse {
    pub secret: String,
    pub otpauth_url: String,
}

// POST /api/auth/2fa/setup
pub async fn setup_two_factor(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> Result<Json<SetupResponse>, AppError> {
    let secret = two_factor::generate_secret();
    {
        let db = state.db()?;
        if !users::set_two_factor_secret(&db, &auth_user.id, &secret)? {
            return Err(AppError::Unauthorized);
        }
    }

    Ok(Json(SetupResponse {
        otpauth_url: two_factor::otpauth_url(&auth_user.email, &secret),
        secret,
    }))
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct TokenRequest {
    pub token: Option<String>,
}

impl TokenRequest {
    fn required(&self) -> Result<&str, AppError> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::BadRequest("token is required".to_string()))
    }
}

fn check_token(state: &AppState, user_id: &str, token: &str) -> Result<(), AppError> {
    let db = state.db()?;
    if two_factor::verify_user_token(&db, user_id, token, Utc::now().timestamp())? {
        Ok(())
    } else {
        Err(AppError::Unauthorized)
    }
}

// POST /api/auth/2fa/verify
pub async fn verify_two_factor(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    ValidJson(req): ValidJson<TokenRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_token(&state, &auth_user.id, req.required()?)?;
    Ok(Json(serde_json::json!({ "verified": true })))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnableResponse {
    pub message: String,
    pub backup_codes: Vec<String>,
}

// POST /api/auth/2fa/enable
pub async fn enable_two_factor(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    ValidJson(req): ValidJson<TokenRequest>,
) -> Result<Json<EnableResponse>, AppError> {
    check_token(&state, &auth_user.id, req.required()?)?;

    let backup_codes = two_factor::generate_backup_codes();
    {
        let db = state.db()?;
        users::enable_two_factor(&db, &auth_user.id, &backup_codes)?;
    }
    tracing::info!(user_id = %auth_user.id, "2FA enabled");

    Ok(Json(EnableResponse {
        message: "2FA enabled".to_string(),
        backup_codes,
    }))
}

// POST /api/auth/2fa/disable
pub async fn disable_two_factor(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    ValidJson(req): ValidJson<TokenRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_token(&state, &auth_user.id, req.required()?)?;
    {
        let db = state.db()?;
        users::disable_two_factor(&db, &auth_user.id)?;
    }
    tracing::info!(user_id = %auth_user.id, "2FA disabled");
    Ok(Json(serde_json::json!({ "message": "2FA disabled" })))
}

// POST /api/auth/2fa/backup
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct BackupCodeRequest {
    pub code: String,
}

pub async fn use_backup_code(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    ValidJson(req): ValidJson<BackupCodeRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if req.code.trim().is_empty() {
        return Err(AppError::BadRequest("code is required".to_string()));
    }
    let consumed = {
        let db = state.db()?;
        two_factor::consume_backup_code(&db, &auth_user.id, &req.code)?
    };
    if !consumed {
        return Err(AppError::Unauthorized);
    }
    Ok(Json(serde_json::json!({ "verified": true })))
}
