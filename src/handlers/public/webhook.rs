// handlers/public/webhook.rs - Budget webhooks authenticated by `authKey`
//
// Azure calls budget-exceed from an action group; a scheduler (or the server's
// own sweep) calls check-budgets. Neither carries a session cookie.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::error::ApiError;
use crate::services::budget::{alert_scope, handle_budget_alert, run_budget_sweep, AlertOutcome};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WebhookQuery {
    #[serde(rename = "authKey")]
    pub auth_key: Option<String>,
}

fn check_key(state: &AppState, query: &WebhookQuery) -> Result<(), ApiError> {
    let expected = &state.config.budget.webhook_key;
    match query.auth_key.as_deref() {
        Some(key) if !expected.is_empty() && key == expected => Ok(()),
        _ => {
            warn!("Rejected webhook call with a missing or wrong authKey");
            Err(ApiError::forbidden("Unauthorized"))
        }
    }
}

/**
 * POST /api/resourceGroup/budget-exceed?authKey=... - Azure budget alert
 *
 * Expected Input (common alert schema, trimmed):
 * ```json
 * {
 *   "data": {
 *     "context": { "resourceId": "/subscriptions/{sub}/resourceGroups/{group}" }
 *   }
 * }
 * ```
 *
 * Stops every app of the group when its auto-shutdown is on.
 */
pub async fn budget_exceed_post(
    State(state): State<AppState>,
    Query(query): Query<WebhookQuery>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    check_key(&state, &query)?;

    let scope = alert_scope(&payload).ok_or_else(|| ApiError::bad_request("Cannot determine resource group"))?;

    let body = match handle_budget_alert(&state, &scope).await? {
        AlertOutcome::AutoStopDisabled => json!({ "success": true, "message": "auto shutdown is turned off" }),
        AlertOutcome::NoApps => json!({ "success": true, "message": "No apps to stop" }),
        AlertOutcome::Stopped { stopped, failed } => json!({ "success": true, "stopped": stopped, "failed": failed }),
    };
    Ok(Json(body))
}

/// GET /api/monitor/check-budgets?authKey=... - Run the budget sweep once
pub async fn check_budgets_get(
    State(state): State<AppState>,
    Query(query): Query<WebhookQuery>,
) -> Result<Json<Value>, ApiError> {
    check_key(&state, &query)?;

    let apps = run_budget_sweep(&state).await?;
    Ok(Json(json!({ "success": true, "apps": apps })))
}
