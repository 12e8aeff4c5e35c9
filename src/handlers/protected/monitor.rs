// handlers/protected/monitor.rs - Cost, settings and lifecycle of one deployed app

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::database::models::{AppSettingsUpdate, NO_BUDGET};
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::services::azure_session::user_with_token;
use crate::services::monitor::{control_app, refresh_cost, update_settings, AppAction};
use crate::services::web_app::owned_app;
use crate::state::AppState;

/// GET /api/monitor/:appId - Month-to-date cost plus the app's budget settings
///
/// Expected Output:
/// ```json
/// {
///   "success": true,
///   "cost": 1.73,
///   "budget": 100,
///   "autoShutdown": true,
///   "appName": "shop",
///   "env": { "NODE_ENV": "production" }
/// }
/// ```
pub async fn monitor_get(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(app_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let app = owned_app(&state, auth_user.id, app_id).await?;
    let (_, token) = user_with_token(&state, auth_user.id).await?;

    let cost = refresh_cost(&state, &token, &app).await?;

    Ok(Json(json!({
        "success": true,
        "cost": cost,
        "budget": app.budget,
        "autoShutdown": app.auto_stop,
        "appName": app.app_name,
        "env": app.env_vars.0,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsRequest {
    pub budget: Option<f64>,
    pub auto_shut: Option<bool>,
    pub env: Option<BTreeMap<String, String>>,
}

/**
 * PUT /api/monitor/:appId - Update budget, auto-shutdown and app settings
 *
 * Expected Input (every field optional):
 * ```json
 * {
 *   "budget": 50,                    // Positive, or -1 for no budget
 *   "autoShut": true,
 *   "env": { "KEY": "value" }        // Merged into the site's app settings
 * }
 * ```
 */
pub async fn monitor_put(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(app_id): Path<Uuid>,
    Json(payload): Json<SettingsRequest>,
) -> Result<Json<Value>, ApiError> {
    if let Some(budget) = payload.budget {
        if !(budget > 0.0 || budget == NO_BUDGET) {
            return Err(ApiError::invalid_field("budget", "Budget must be a positive number"));
        }
    }

    let app = owned_app(&state, auth_user.id, app_id).await?;
    let update = AppSettingsUpdate {
        budget: payload.budget,
        auto_stop: payload.auto_shut,
        env_vars: payload.env.filter(|env| !env.is_empty()),
    };

    let app = if update.env_vars.is_some() {
        let (_, token) = user_with_token(&state, auth_user.id).await?;
        update_settings(&state, &token, &app, update).await?
    } else {
        state.store.update_app_settings(app.id, update).await?
    };

    Ok(Json(json!({
        "success": true,
        "message": "Settings updated successfully",
        "data": app,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    #[serde(default)]
    pub action: String,
}

/// POST /api/monitor/:appId - `{"action": "stop" | "restart" | "delete"}`
pub async fn monitor_post(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(app_id): Path<Uuid>,
    Json(payload): Json<ActionRequest>,
) -> Result<Json<Value>, ApiError> {
    let action: AppAction = payload.action.parse()?;

    let app = owned_app(&state, auth_user.id, app_id).await?;
    let (_, token) = user_with_token(&state, auth_user.id).await?;

    let message = control_app(&state, &token, &app, action).await?;
    Ok(Json(json!({ "success": true, "message": message })))
}
