//! Handlers for the `/auth` resource (register, login, me).

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tutorgen_core::error::CoreError;
use tutorgen_core::types::DbId;
use tutorgen_db::models::user::{CreateUser, UserResponse};
use tutorgen_db::repositories::UserRepo;
use validator::ValidateEmail;

use crate::auth::jwt::generate_access_token;
use crate::auth::password::{hash_password, validate_password_strength, verify_password};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Minimum password length enforced on registration.
const MIN_PASSWORD_LENGTH: usize = 8;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/register`.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

/// Request body for `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Successful authentication response returned by register and login.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/register
///
/// Create an account and return an access token. Duplicate emails are a
/// conflict; email syntax and password strength are validated first.
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<TokenResponse>)> {
    if !input.email.validate_email() {
        return Err(AppError::Core(CoreError::Validation(
            "Invalid email address".into(),
        )));
    }
    validate_password_strength(&input.password, MIN_PASSWORD_LENGTH)
        .map_err(|msg| AppError::Core(CoreError::Validation(msg)))?;

    if UserRepo::find_by_email(&state.pool, &input.email)
        .await?
        .is_some()
    {
        return Err(AppError::Core(CoreError::Conflict(
            "Email already registered".into(),
        )));
    }

    let hashed = hash_password(&input.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    // A concurrent registration can still hit uq_users_email here; the
    // error classifier turns that into the same 409.
    let user = UserRepo::create(
        &state.pool,
        &CreateUser {
            email: input.email,
            full_name: input.full_name,
            password_hash: hashed,
        },
    )
    .await?;

    tracing::info!(user_id = user.id, "User registered");

    let response = token_response(&state, user.id)?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/v1/auth/login
///
/// Authenticate with email + password. An unknown email and a wrong
/// password produce the same rejection.
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let invalid_credentials =
        || AppError::Core(CoreError::Unauthorized("Incorrect email or password".into()));

    let user = UserRepo::find_by_email(&state.pool, &input.email)
        .await?
        .ok_or_else(invalid_credentials)?;

    if !user.is_active {
        return Err(AppError::Core(CoreError::Unauthorized(
            "Account is deactivated".into(),
        )));
    }

    let password_valid = verify_password(&input.password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !password_valid {
        return Err(invalid_credentials());
    }

    Ok(Json(token_response(&state, user.id)?))
}

/// GET /api/v1/auth/me
///
/// Return the authenticated user's profile.
pub async fn me(auth: AuthUser, State(state): State<AppState>) -> AppResult<Json<UserResponse>> {
    let user = UserRepo::find_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized("User no longer exists".into()))
        })?;

    Ok(Json(user.into()))
}

fn token_response(state: &AppState, user_id: DbId) -> AppResult<TokenResponse> {
    let access_token = generate_access_token(user_id, &state.config.jwt)
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;
    Ok(TokenResponse {
        access_token,
        token_type: "bearer",
        expires_in: state.config.jwt.access_token_expiry_mins * 60,
    })
}
