// handlers/public/auth/azure_callback.rs - GET /api/auth/azure/callback handler
//
// Public route: the browser arrives from login.microsoftonline.com, where the
// strict session cookie is not sent. The user is identified by the signed
// `state`, which must also match the `azure_oauth_state` cookie.

use axum::{
    extract::{Query, State},
    response::Redirect,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;
use tracing::{info, warn};

use crate::auth::{validate_jwt, TokenKind};
use crate::error::ApiError;
use crate::handlers::protected::auth::azure::{OAUTH_STATE_COOKIE, OAUTH_STATE_PATH};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// GET /api/auth/azure/callback?code=&state= - Finish linking and go back to the dashboard
pub async fn azure_callback_get(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> Result<(CookieJar, Redirect), ApiError> {
    if let Some(error) = &query.error {
        warn!(
            "Azure consent failed: {} {}",
            error,
            query.error_description.as_deref().unwrap_or_default()
        );
    }

    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing authorization code."))?;

    let expected = jar.get(OAUTH_STATE_COOKIE).map(|c| c.value().to_string());
    let oauth_state = match (query.state, expected) {
        (Some(received), Some(expected)) if !received.is_empty() && received == expected => received,
        _ => return Err(ApiError::bad_request("Invalid OAuth state.")),
    };
    let claims = validate_jwt(&oauth_state, TokenKind::OauthState, &state.config.security)
        .map_err(|_| ApiError::bad_request("Invalid OAuth state."))?;

    let user = state
        .store
        .find_user(claims.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found in database"))?;

    let link = state
        .azure
        .exchange_code(user.oauth_client(), &code)
        .await
        .map_err(|e| ApiError::from(e).context("Failed to fetch tokens from Azure"))?;
    state.store.save_azure_link(user.id, &link).await?;
    info!("Linked Azure account for {}", user.email);

    let jar = jar.remove(Cookie::build(OAUTH_STATE_COOKIE).path(OAUTH_STATE_PATH));
    let target = format!("{}/dashboard?linked=true", state.config.api.public_base_url);
    Ok((jar, Redirect::to(&target)))
}
