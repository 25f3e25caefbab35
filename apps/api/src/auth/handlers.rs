//! Axum route handlers for the auth API.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::auth::mailer::OutgoingEmail;
use crate::auth::password::{
    hash_password_blocking, validate_password, verify_password_blocking,
};
use crate::auth::revocation;
use crate::auth::tokens::{password_fingerprint, TokenError, TokenPair, TokenPurpose};
use crate::db::is_unique_violation;
use crate::errors::AppError;
use crate::models::user::{normalize_email, User, UserSummary};
use crate::response::Envelope;
use crate::state::AppState;
use crate::validation::is_valid_email;

const RESEND_MESSAGE: &str =
    "If this email is registered and unverified, a verification email has been sent.";
const RESET_MESSAGE: &str = "If this email is registered, a password reset link has been sent.";

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password1: String,
    pub password2: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetConfirmRequest {
    pub uid: String,
    pub token: String,
    pub new_password1: String,
    pub new_password2: String,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserSummary,
    pub tokens: TokenPair,
}

#[derive(Debug, Serialize)]
pub struct AccessResponse {
    pub access: String,
}

fn signing_error(e: TokenError) -> AppError {
    AppError::Internal(anyhow::anyhow!("Token signing failed: {e}"))
}

fn valid_email(raw: &str) -> Result<String, AppError> {
    let email = normalize_email(raw);
    if !is_valid_email(&email) {
        return Err(AppError::Validation("Enter a valid email address.".to_string()));
    }
    Ok(email)
}

fn check_new_password(password1: &str, password2: &str, email: &str) -> Result<(), AppError> {
    if password1 != password2 {
        return Err(AppError::Validation("Passwords do not match.".to_string()));
    }
    validate_password(password1, email).map_err(AppError::Validation)
}

/// Queues a verification email. Delivery problems never fail the caller.
async fn queue_verification(state: &AppState, user: &User) {
    let key = match state.tokens.issue_email_verification(user.id) {
        Ok(key) => key,
        Err(e) => {
            warn!("Failed to sign verification key for {}: {e}", user.email);
            return;
        }
    };
    let email = OutgoingEmail::verification(&user.email, &state.config.frontend_url, &key);
    if let Err(e) = state.mailer.send(email).await {
        warn!("Failed to send verification email to {}: {e:#}", user.email);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /auth/signup
pub async fn handle_signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<Envelope<SignupResponse>, AppError> {
    let email = valid_email(&req.email)?;
    if User::find_by_email(&state.db, &email).await?.is_some() {
        return Err(AppError::Duplicate(
            "A user with this email already exists.".to_string(),
        ));
    }
    check_new_password(&req.password1, &req.password2, &email)?;

    let hash = hash_password_blocking(req.password1).await?;
    let user = User::create(&state.db, &email, &hash).await.map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Duplicate("A user with this email already exists.".to_string())
        } else {
            AppError::Database(e)
        }
    })?;
    info!("Created user {} ({})", user.id, user.email);

    queue_verification(&state, &user).await;

    Ok(Envelope::data(SignupResponse { email: user.email })
        .with_message("Account created. Please check your email to verify your account.")
        .created())
}

/// POST /auth/login
pub async fn handle_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Envelope<LoginResponse>, AppError> {
    let invalid = || AppError::Unauthorized("Invalid email or password.".to_string());

    let email = normalize_email(&req.email);
    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password_blocking(req.password, user.password_hash.clone()).await? {
        return Err(invalid());
    }
    if !user.is_active {
        return Err(AppError::Forbidden("Account is disabled.".to_string()));
    }
    if state.config.require_email_verification && !user.email_verified {
        return Err(AppError::Forbidden(
            "Email not verified. Please check your inbox and verify your email before logging in."
                .to_string(),
        ));
    }

    let tokens = state.tokens.issue_pair(user.id).map_err(signing_error)?;
    info!("User {} logged in", user.id);

    Ok(Envelope::data(LoginResponse {
        user: UserSummary::from(&user),
        tokens,
    }))
}

/// POST /auth/logout
///
/// Revokes the supplied refresh token. Access tokens simply expire.
pub async fn handle_logout(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<RefreshRequest>,
) -> Result<Envelope<()>, AppError> {
    let token = req
        .refresh
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Refresh token is required.".to_string()))?;

    let claims = state
        .tokens
        .verify(&token, TokenPurpose::Refresh)
        .map_err(|e| AppError::Validation(e.to_string()))?;
    if claims.sub != user.user_id {
        return Err(AppError::Validation(
            "Token does not belong to the current user.".to_string(),
        ));
    }

    revocation::revoke(&state.redis, &claims).await?;
    info!("User {} logged out", user.user_id);

    Ok(Envelope::message("Logged out successfully."))
}

/// GET /auth/me
pub async fn handle_me(user: AuthUser) -> Envelope<UserSummary> {
    Envelope::data(UserSummary {
        id: user.user_id,
        email: user.email,
    })
}

/// GET /auth/verify-email/:key
pub async fn handle_verify_email(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Envelope<()>, AppError> {
    let invalid = || AppError::Validation("Invalid or expired verification link.".to_string());

    let claims = state
        .tokens
        .verify(&key, TokenPurpose::VerifyEmail)
        .map_err(|_| invalid())?;
    if !User::mark_email_verified(&state.db, claims.sub).await? {
        return Err(invalid());
    }
    info!("Verified email for user {}", claims.sub);

    Ok(Envelope::message(
        "Email verified successfully. You can now log in.",
    ))
}

/// POST /auth/resend-verification
///
/// Same answer whether or not the address is registered.
pub async fn handle_resend_verification(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> Result<Envelope<()>, AppError> {
    let email = valid_email(&req.email)?;
    if let Some(user) = User::find_by_email(&state.db, &email).await? {
        if !user.email_verified {
            queue_verification(&state, &user).await;
        }
    }
    Ok(Envelope::message(RESEND_MESSAGE))
}

/// POST /auth/password/reset
pub async fn handle_password_reset(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> Result<Envelope<()>, AppError> {
    let email = valid_email(&req.email)?;
    let Some(user) = User::find_by_email(&state.db, &email)
        .await?
        .filter(|u| u.is_active)
    else {
        return Ok(Envelope::message(RESET_MESSAGE));
    };

    let token = state
        .tokens
        .issue_password_reset(user.id, &user.password_hash)
        .map_err(signing_error)?;
    let message = OutgoingEmail::password_reset(
        &user.email,
        &state.config.frontend_url,
        &user.id.to_string(),
        &token,
    );
    if let Err(e) = state.mailer.send(message).await {
        warn!("Failed to send password reset email to {}: {e:#}", user.email);
    }

    Ok(Envelope::message(RESET_MESSAGE))
}

/// POST /auth/password/reset/confirm
///
/// A reset token is single use: it is bound to the password hash it was issued against.
pub async fn handle_password_reset_confirm(
    State(state): State<AppState>,
    Json(req): Json<PasswordResetConfirmRequest>,
) -> Result<Envelope<()>, AppError> {
    let bad_link = || AppError::Validation("Invalid reset link.".to_string());
    let expired = || AppError::Validation("Invalid or expired reset link.".to_string());

    let uid = Uuid::parse_str(req.uid.trim()).map_err(|_| bad_link())?;
    let user = User::find_by_id(&state.db, uid).await?.ok_or_else(bad_link)?;

    let claims = state
        .tokens
        .verify(&req.token, TokenPurpose::PasswordReset)
        .map_err(|_| expired())?;
    let fingerprint = password_fingerprint(&user.password_hash);
    if claims.sub != user.id || claims.pwd.as_deref() != Some(fingerprint.as_str()) {
        return Err(expired());
    }

    check_new_password(&req.new_password1, &req.new_password2, &user.email)?;
    let hash = hash_password_blocking(req.new_password1).await?;
    User::reset_password(&state.db, user.id, &hash).await?;
    info!("Password reset for user {}", user.id);

    Ok(Envelope::message(
        "Password has been reset successfully. You can now log in.",
    ))
}

/// POST /auth/token/refresh
pub async fn handle_token_refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Envelope<AccessResponse>, AppError> {
    let token = req
        .refresh
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Refresh token is required.".to_string()))?;

    let claims = state
        .tokens
        .verify(&token, TokenPurpose::Refresh)
        .map_err(|e| AppError::Unauthorized(e.to_string()))?;
    if revocation::is_revoked(&state.redis, claims.jti).await? {
        return Err(AppError::Unauthorized("Token is blacklisted".to_string()));
    }

    let access = state.tokens.issue_access(claims.sub).map_err(signing_error)?;
    Ok(Envelope::data(AccessResponse { access }))
}
