// handlers/protected/auth/azure.rs - Azure account linking and ARM-backed setup
//
// GET  /api/auth/azure                  - start the OAuth consent flow
// GET  /api/auth/azure/check            - site name availability
// POST /api/auth/azure/create-web-app   - provision plan + Linux web app
// POST /api/auth/azure/sync             - mirror subscriptions, groups and sites

use axum::{
    extract::{Query, State},
    response::Redirect,
    Extension, Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Duration;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::{generate_jwt, Claims};
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::azure_session::user_with_token;
use crate::services::sync::{sync_azure, SyncSummary};
use crate::services::web_app::{create_web_app, WebAppRequest};
use crate::state::AppState;

/// Cookie holding the OAuth `state` between redirect and callback
pub const OAUTH_STATE_COOKIE: &str = "azure_oauth_state";
pub const OAUTH_STATE_PATH: &str = "/api/auth/azure";
const OAUTH_STATE_TTL_MINUTES: i64 = 10;

/// GET /api/auth/azure - Redirect to the user's tenant consent page
///
/// The `state` parameter is a short-lived signed token naming the user; it is
/// also stored in a cookie so the callback can match the two.
pub async fn oauth_start_get(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), ApiError> {
    let user = state
        .store
        .find_user(auth_user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let claims = Claims::oauth_state(user.id, user.email.clone(), Duration::minutes(OAUTH_STATE_TTL_MINUTES));
    let oauth_state = generate_jwt(&claims, &state.config.security)?;
    let url = state.azure.authorize_url(user.oauth_client(), &oauth_state)?;

    let cookie = Cookie::build((OAUTH_STATE_COOKIE, oauth_state))
        .http_only(true)
        .secure(state.config.security.secure_cookies)
        // The callback is a cross-site top-level navigation
        .same_site(SameSite::Lax)
        .path(OAUTH_STATE_PATH)
        .max_age(time::Duration::minutes(OAUTH_STATE_TTL_MINUTES))
        .build();

    Ok((jar.add(cookie), Redirect::to(&url)))
}

#[derive(Debug, Deserialize)]
pub struct NameQuery {
    pub name: Option<String>,
}

/// GET /api/auth/azure/check?name= - Is `{name}.azurewebsites.net` free?
///
/// Expected Output:
/// ```json
/// { "success": true, "message": true, "fullMessage": null }
/// ```
pub async fn check_name_get(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<NameQuery>,
) -> Result<Json<Value>, ApiError> {
    let name = query
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("No name found"))?;

    let (_, token) = user_with_token(&state, auth_user.id).await?;
    let subscription = state
        .store
        .list_subscriptions(auth_user.id)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::bad_request("No subscription found. Sync your Azure account first."))?;

    let availability = state
        .azure
        .check_name_availability(&token, &subscription.subscription_id, name.trim())
        .await
        .map_err(|e| ApiError::from(e).context("Name is not valid or something went wrong"))?;

    Ok(Json(json!({
        "success": true,
        "message": availability.name_available,
        "fullMessage": availability.message,
    })))
}

#[derive(Debug, Deserialize)]
pub struct CreateWebAppRequest {
    #[serde(rename = "Appname", alias = "appName")]
    pub app_name: String,
    #[serde(rename = "resourceGroup")]
    pub resource_group: String,
    #[serde(rename = "subscriptionId")]
    pub subscription_id: String,
    #[serde(rename = "_id", alias = "appId")]
    pub app_id: Uuid,
}

/**
 * POST /api/auth/azure/create-web-app - Create the Linux web app for a draft
 *
 * Expected Input:
 * ```json
 * {
 *   "Appname": "string",        // Azure site name (becomes {name}.azurewebsites.net)
 *   "resourceGroup": "string",
 *   "subscriptionId": "string",
 *   "_id": "uuid"               // Dashboard app id
 * }
 * ```
 */
pub async fn create_web_app_post(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<CreateWebAppRequest>,
) -> Result<Json<Value>, ApiError> {
    if payload.app_name.trim().is_empty()
        || payload.resource_group.trim().is_empty()
        || payload.subscription_id.trim().is_empty()
    {
        return Err(ApiError::bad_request("Missing required fields!"));
    }

    let (user, token) = user_with_token(&state, auth_user.id).await?;
    let provisioned = create_web_app(
        &state,
        &user,
        &token,
        WebAppRequest {
            app_id: payload.app_id,
            site_name: payload.app_name.trim().to_string(),
            subscription_id: payload.subscription_id,
            resource_group: payload.resource_group,
        },
    )
    .await?;

    let site_name = provisioned.app.app_name.clone().unwrap_or_default();
    Ok(Json(json!({
        "success": true,
        "message": "Linux Web App created successfully",
        "hostedUrl": AppConfig::hosted_url(&site_name),
        "data": provisioned.site,
        "app": provisioned.app,
    })))
}

/// POST /api/auth/azure/sync - Pull subscriptions, resource groups and web apps from Azure
pub async fn sync_post(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<SyncSummary> {
    let (user, token) = user_with_token(&state, auth_user.id).await?;
    let summary = sync_azure(&state, &user, &token)
        .await
        .map_err(|e| e.context("Azure sync failed"))?;

    Ok(ApiResponse::success(summary)
        .with_message("Successfully synced subscriptions, resource groups, and apps."))
}
