// handlers/protected/resource_group.rs - Resource groups and their Azure budgets

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::BudgetConfig;
use crate::database::models::{NewResourceGroup, ResourceGroup};
use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::azure_session::user_with_token;
use crate::services::budget::{configure_budget, BudgetSettings};
use crate::state::AppState;

const DEFAULT_LOCATION: &str = "centralindia";

/// GET /api/resourceGroup - The user's resource groups
pub async fn resource_groups_get(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Vec<ResourceGroup>> {
    let groups = state.store.list_resource_groups(auth_user.id).await?;
    if groups.is_empty() {
        return Err(ApiError::not_found("No resourceGroups found for this user."));
    }
    Ok(ApiResponse::success(groups))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    #[serde(default)]
    pub resource_group: String,
    pub location: Option<String>,
    pub subscription_id: Option<String>,
}

/**
 * POST /api/resourceGroup - Create a resource group in Azure and track it
 *
 * Expected Input:
 * ```json
 * {
 *   "resourceGroup": "string",
 *   "location": "centralindia",      // optional
 *   "subscriptionId": "string"       // optional, defaults to the first synced subscription
 * }
 * ```
 */
pub async fn resource_group_post(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<CreateGroupRequest>,
) -> ApiResult<ResourceGroup> {
    let name = payload.resource_group.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::invalid_field("resourceGroup", "Resource group name is required"));
    }
    let location = payload
        .location
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LOCATION.to_string());

    let (_, token) = user_with_token(&state, auth_user.id).await?;
    let subscription_id = match payload.subscription_id.filter(|s| !s.trim().is_empty()) {
        Some(id) => id,
        None => state
            .store
            .list_subscriptions(auth_user.id)
            .await?
            .into_iter()
            .next()
            .map(|s| s.subscription_id)
            .ok_or_else(|| ApiError::bad_request("No subscription found. Sync your Azure account first."))?,
    };

    state
        .azure
        .create_resource_group(&token, &subscription_id, &name, &location)
        .await
        .map_err(|e| ApiError::from(e).context("Failed to create resource group"))?;

    let created = state
        .store
        .create_resource_group(NewResourceGroup {
            user_id: auth_user.id,
            subscription_id,
            name,
            location: Some(location),
        })
        .await;

    match created {
        Ok(group) => Ok(ApiResponse::created(group).with_message("Resource group created successfully")),
        Err(DatabaseError::Conflict(_)) => Err(ApiError::conflict("Resource group already exists")),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckNameQuery {
    pub name: Option<String>,
}

/// GET /api/resourceGroup/check-name?name= - `{"exists": bool}` among the user's groups
pub async fn check_name_get(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<CheckNameQuery>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Some(name) = query.name.filter(|n| !n.trim().is_empty()) else {
        return Ok((StatusCode::BAD_REQUEST, Json(json!({ "exists": false }))));
    };

    let exists = !state
        .store
        .find_resource_groups(auth_user.id, name.trim())
        .await?
        .is_empty();
    Ok((StatusCode::OK, Json(json!({ "exists": exists }))))
}

/// Group names are only unique per subscription; without one the name must
/// resolve to a single group.
async fn owned_group(
    state: &AppState,
    auth_user: &AuthUser,
    name: &str,
    subscription_id: Option<&str>,
) -> Result<ResourceGroup, ApiError> {
    let groups = state.store.find_resource_groups(auth_user.id, name).await?;
    pick_group(groups, subscription_id)
}

fn pick_group(groups: Vec<ResourceGroup>, subscription_id: Option<&str>) -> Result<ResourceGroup, ApiError> {
    let mut matches: Vec<ResourceGroup> = match subscription_id.filter(|s| !s.trim().is_empty()) {
        Some(sub) => groups.into_iter().filter(|g| g.subscription_id == sub).collect(),
        None => groups,
    };
    match matches.len() {
        0 => Err(ApiError::not_found("Resource group not found")),
        1 => Ok(matches.remove(0)),
        _ => Err(ApiError::conflict(
            "Resource group exists in several subscriptions. Pass subscriptionId.",
        )),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupQuery {
    pub subscription_id: Option<String>,
}

/// GET /api/resourceGroup/budget/:group?subscriptionId=
pub async fn budget_get(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(group): Path<String>,
    Query(query): Query<GroupQuery>,
) -> ApiResult<ResourceGroup> {
    let group = owned_group(&state, &auth_user, &group, query.subscription_id.as_deref()).await?;
    Ok(ApiResponse::success(group))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetRequest {
    pub subscription_id: Option<String>,
    pub amount: Option<f64>,
    pub threshold: Option<f64>,
    #[serde(default)]
    pub auto_shut: bool,
}

impl BudgetRequest {
    fn settings(&self, defaults: &BudgetConfig) -> Result<BudgetSettings, ApiError> {
        let amount = self.amount.unwrap_or(defaults.default_amount);
        let threshold = self.threshold.unwrap_or(defaults.default_threshold);
        if amount <= 0.0 {
            return Err(ApiError::invalid_field("amount", "Amount must be a positive number"));
        }
        if threshold <= 0.0 {
            return Err(ApiError::invalid_field("threshold", "Threshold must be a positive number"));
        }
        Ok(BudgetSettings { amount, threshold, auto_shut: self.auto_shut })
    }
}

/**
 * PUT /api/resourceGroup/budget/:group - Create or update the monthly Azure budget
 *
 * Expected Input:
 * ```json
 * {
 *   "subscriptionId": "string", // Required when the name exists in several subscriptions
 *   "amount": 1000,        // Monthly budget, default 1000
 *   "threshold": 100,      // Notification threshold (percent), default 100
 *   "autoShut": true       // Stop the group's apps when the alert fires
 * }
 * ```
 */
pub async fn budget_put(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(group): Path<String>,
    Json(payload): Json<BudgetRequest>,
) -> Result<Json<Value>, ApiError> {
    let settings = payload.settings(&state.config.budget)?;
    let group = owned_group(&state, &auth_user, &group, payload.subscription_id.as_deref()).await?;
    let (user, token) = user_with_token(&state, auth_user.id).await?;

    let (group, budget) = configure_budget(&state, &user, &token, &group, settings).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Budget configured successfully",
        "data": group,
        "budget": budget,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn budget_defaults() {
        let request: BudgetRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(
            request.settings(&AppConfig::development().budget).unwrap(),
            BudgetSettings { amount: 1000.0, threshold: 100.0, auto_shut: false }
        );
    }

    fn group(subscription_id: &str) -> ResourceGroup {
        ResourceGroup {
            id: uuid::Uuid::new_v4(),
            user_id: uuid::Uuid::nil(),
            subscription_id: subscription_id.to_string(),
            name: "rg".to_string(),
            location: None,
            budget: 0.0,
            auto_stop: false,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn group_is_picked_by_subscription() {
        let groups = vec![group("sub-1"), group("sub-2")];
        let picked = pick_group(groups.clone(), Some("sub-2")).unwrap();
        assert_eq!(picked.subscription_id, "sub-2");

        assert!(matches!(pick_group(groups.clone(), None), Err(ApiError::Conflict(_))));
        assert!(matches!(pick_group(groups, Some("sub-3")), Err(ApiError::NotFound(_))));
        assert_eq!(pick_group(vec![group("sub-1")], None).unwrap().subscription_id, "sub-1");
    }

    #[test]
    fn non_positive_amount_is_rejected() {
        let request: BudgetRequest = serde_json::from_value(json!({ "amount": 0, "autoShut": true })).unwrap();
        assert!(request.settings(&AppConfig::development().budget).is_err());
    }
}
