use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use uuid::Uuid;

use crate::auth::tokens::{TokenError, TokenPurpose};
use crate::errors::AppError;
use crate::models::user::User;
use crate::state::AppState;

/// The caller, resolved from `Authorization: Bearer <access token>`.
/// Every authenticated route takes this as an argument.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = bearer_token(parts).ok_or_else(|| {
            AppError::Unauthorized("Authentication credentials were not provided.".to_string())
        })?;

        let claims = state
            .tokens
            .verify(token, TokenPurpose::Access)
            .map_err(|e| match e {
                TokenError::Expired => AppError::Unauthorized("Token is expired".to_string()),
                _ => AppError::Unauthorized("Given token not valid for any token type".to_string()),
            })?;

        let user = User::find_by_id(&state.db, claims.sub)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| AppError::Unauthorized("User not found or inactive".to_string()))?;

        Ok(AuthUser {
            user_id: user.id,
            email: user.email,
        })
    }
}
