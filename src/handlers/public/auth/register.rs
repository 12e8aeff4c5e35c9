// handlers/public/auth/register.rs - POST /api/auth/register handler

use axum::{extract::State, Json};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::info;

use super::{start_session, validate_credentials};
use crate::auth::{hash_password, verify_password};
use crate::database::models::{NewUser, User};
use crate::error::ApiError;
use crate::middleware::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub tenant_id: String,
}

impl RegisterRequest {
    fn missing_fields(&self) -> Option<HashMap<String, String>> {
        let missing: HashMap<String, String> = [
            ("name", &self.name),
            ("clientId", &self.client_id),
            ("clientSecret", &self.client_secret),
            ("tenantId", &self.tenant_id),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| (field.to_string(), "Required".to_string()))
        .collect();

        (!missing.is_empty()).then_some(missing)
    }
}

/**
 * POST /api/auth/register - Create an account, or log in if it already exists
 *
 * Expected Input:
 * ```json
 * {
 *   "email": "string",         // Required
 *   "password": "string",      // Required, at least 6 characters
 *   "name": "string",          // Required for new accounts
 *   "clientId": "string",      // Azure AD app registration
 *   "clientSecret": "string",
 *   "tenantId": "string"
 * }
 * ```
 *
 * An existing email with the right password logs the user in; with the wrong
 * password the call answers 401.
 */
pub async fn register_post(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<RegisterRequest>,
) -> Result<(CookieJar, ApiResponse<User>), ApiError> {
    validate_credentials(&payload.email, &payload.password)?;

    if let Some(existing) = state.store.find_user_by_email(&payload.email).await? {
        if !verify_password(&payload.password, &existing.password_hash) {
            return Err(ApiError::unauthorized("User already exists, but password is incorrect"));
        }
        let jar = start_session(jar, &existing, &state.config.security)?;
        return Ok((jar, ApiResponse::success(existing).with_message("User already existed, logged in")));
    }

    if let Some(missing) = payload.missing_fields() {
        return Err(ApiError::validation_error("All the fields are required", Some(missing)));
    }

    let user = state
        .store
        .create_user(NewUser {
            email: payload.email.trim().to_string(),
            password_hash: hash_password(&payload.password)?,
            name: payload.name.trim().to_string(),
            client_id: payload.client_id.trim().to_string(),
            client_secret: payload.client_secret,
            tenant_id: payload.tenant_id.trim().to_string(),
        })
        .await?;
    info!("Registered user {}", user.email);

    let jar = start_session(jar, &user, &state.config.security)?;
    Ok((jar, ApiResponse::created(user).with_message("User registered and logged in")))
}
