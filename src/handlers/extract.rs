use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::errors::AppError;
use crate::models::Role;
use crate::services::auth;
use crate::state::AppState;

/// Caller identified by a valid bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub role: Role,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(auth::bearer_token)
            .ok_or(AppError::Unauthorized)?;

        let claims = auth::decode_token(token, &state.config.jwt_secret).map_err(|e| {
            tracing::warn!(error = %e, uri = %parts.uri, "rejected bearer token");
            AppError::Unauthorized
        })?;

        Ok(AuthUser {
            id: claims.sub,
            email: claims.email,
            role: claims.role,
        })
    }
}

/// `AuthUser` with the ADMIN role; anyone else gets 403.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            tracing::warn!(user_id = %user.id, uri = %parts.uri, "non-admin on admin route");
            return Err(AppError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}

/// JSON body that must deserialize and pass its `Validate` rules. Both
/// failures are 400s.
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        value.validate()?;
        Ok(ValidJson(value))
    }
}
