// handlers/public/auth/login.rs - POST /api/auth/login handler

use axum::{extract::State, Json};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use tracing::info;

use super::{start_session, validate_credentials};
use crate::auth::verify_password;
use crate::database::models::User;
use crate::error::ApiError;
use crate::middleware::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/**
 * POST /api/auth/login - Check credentials and start a session
 *
 * Expected Input:
 * ```json
 * {
 *   "email": "string",    // Required
 *   "password": "string"  // Required, at least 6 characters
 * }
 * ```
 *
 * Sets the `token` cookie and returns the user (without secrets).
 * Any mismatch answers 401 "Invalid credentials".
 */
pub async fn login_post(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, ApiResponse<User>), ApiError> {
    validate_credentials(&payload.email, &payload.password)?;

    let user = state
        .store
        .find_user_by_email(&payload.email)
        .await?
        .filter(|user| verify_password(&payload.password, &user.password_hash))
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    let jar = start_session(jar, &user, &state.config.security)?;
    info!("User {} logged in", user.email);

    Ok((jar, ApiResponse::success(user).with_message("Login successful")))
}
