// handlers/protected/apps.rs - App records (drafts until a web app backs them)

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::database::models::{App, NewApp, NO_BUDGET};
use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::web_app::owned_app;
use crate::state::AppState;

const DUPLICATE_NAME: &str = "App with this name already exists for your account.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub subscription_id: String,
    #[serde(default)]
    pub resource_group: String,
    #[serde(default)]
    pub app_service_name: String,
    pub budget: Option<f64>,
}

impl CreateAppRequest {
    fn validate(&self) -> Result<f64, ApiError> {
        let mut field_errors = HashMap::new();
        for (field, value, label) in [
            ("name", &self.name, "App name is required"),
            ("subscriptionId", &self.subscription_id, "Subscription ID is required"),
            ("resourceGroup", &self.resource_group, "Resource group is required"),
            ("appServiceName", &self.app_service_name, "App service name is required"),
        ] {
            if value.trim().is_empty() {
                field_errors.insert(field.to_string(), label.to_string());
            }
        }

        let budget = self.budget.unwrap_or(NO_BUDGET);
        if !(budget > 0.0 || budget == NO_BUDGET) {
            field_errors.insert("budget".to_string(), "Budget must be a positive number".to_string());
        }

        if field_errors.is_empty() {
            Ok(budget)
        } else {
            Err(ApiError::validation_error("Invalid request body", Some(field_errors)))
        }
    }
}

/**
 * POST /api/apps - Create a draft app
 *
 * Expected Input:
 * ```json
 * {
 *   "name": "string",            // Unique per user
 *   "subscriptionId": "string",
 *   "resourceGroup": "string",
 *   "appServiceName": "string",
 *   "budget": 100                // Positive, or -1 for no budget
 * }
 * ```
 */
pub async fn apps_post(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<CreateAppRequest>,
) -> ApiResult<App> {
    let budget = payload.validate()?;

    let created = state
        .store
        .create_app(NewApp {
            user_id: auth_user.id,
            name: payload.name.trim().to_string(),
            subscription_id: payload.subscription_id.trim().to_string(),
            resource_group: payload.resource_group.trim().to_string(),
            app_service_name: payload.app_service_name.trim().to_string(),
            budget,
        })
        .await;

    match created {
        Ok(app) => Ok(ApiResponse::created(app).with_message("App created successfully.")),
        Err(DatabaseError::Conflict(_)) => Err(ApiError::bad_request(DUPLICATE_NAME)),
        Err(e) => Err(e.into()),
    }
}

/// GET /api/apps - All apps of the current user
pub async fn apps_get(State(state): State<AppState>, Extension(auth_user): Extension<AuthUser>) -> ApiResult<Vec<App>> {
    let apps = state.store.list_apps(auth_user.id).await?;
    Ok(ApiResponse::success(apps))
}

/// GET /api/apps/:appId - One app; 404 when missing or owned by someone else
pub async fn app_get(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(app_id): Path<Uuid>,
) -> ApiResult<App> {
    let app = owned_app(&state, auth_user.id, app_id)
        .await
        .map_err(|_| ApiError::not_found("App not Found"))?;
    Ok(ApiResponse::success(app))
}
