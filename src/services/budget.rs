//! Resource group budgets, Azure budget alerts and the periodic budget sweep.

use chrono::{DateTime, Datelike, Utc};
use futures::future::join_all;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::azure::{SiteAction, SiteRef};
use crate::database::models::{App, ResourceGroup, User};
use crate::error::ApiError;
use crate::services::azure_session::access_token;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetSettings {
    pub amount: f64,
    pub threshold: f64,
    pub auto_shut: bool,
}

/// `budget-{group}`, shared by the budget and its action group
pub fn budget_name(resource_group: &str) -> String {
    format!("budget-{}", resource_group)
}

/// Monthly cost budget starting on the first of the current UTC month, for one year
pub fn budget_payload(
    settings: &BudgetSettings,
    contact_email: &str,
    webhook_uri: &str,
    webhook_key: &str,
    action_group_id: Option<&str>,
    now: DateTime<Utc>,
) -> Value {
    let start_date = format!("{}-{:02}-01T00:00:00Z", now.year(), now.month());
    let end_date = format!("{}-{:02}-01T00:00:00Z", now.year() + 1, now.month());

    let mut breach = json!({
        "enabled": true,
        "operator": "GreaterThan",
        "threshold": settings.threshold,
        "contactEmails": [contact_email],
        "webhookNotification": {
            "serviceUri": webhook_uri,
            "properties": { "authKey": webhook_key }
        }
    });
    if let Some(id) = action_group_id {
        breach["actionGroups"] = json!([id]);
    }

    json!({
        "properties": {
            "category": "Cost",
            "amount": settings.amount,
            "timeGrain": "Monthly",
            "timePeriod": { "startDate": start_date, "endDate": end_date },
            "notifications": { "budgetBreach": breach }
        }
    })
}

/// Create or update the group's Azure budget (and, with auto-shutdown, the
/// action group that calls our webhook), then store the settings.
pub async fn configure_budget(
    state: &AppState,
    user: &User,
    token: &str,
    group: &ResourceGroup,
    settings: BudgetSettings,
) -> Result<(ResourceGroup, Value), ApiError> {
    let name = budget_name(&group.name);
    let webhook_uri = state.config.budget_webhook_url();

    let action_group_id = if settings.auto_shut {
        let id = state
            .azure
            .upsert_action_group(token, &group.subscription_id, &group.name, &name, &webhook_uri)
            .await
            .map_err(|e| ApiError::from(e).context("Failed to create action group"))?;
        Some(id)
    } else {
        None
    };

    let payload = budget_payload(
        &settings,
        &user.email,
        &webhook_uri,
        &state.config.budget.webhook_key,
        action_group_id.as_deref(),
        Utc::now(),
    );
    let budget = state
        .azure
        .upsert_budget(token, &group.subscription_id, &group.name, &name, &payload)
        .await
        .map_err(|e| ApiError::from(e).context("Failed to create or update budget"))?;

    let group = state
        .store
        .update_resource_group_budget(group.id, settings.amount, settings.auto_shut)
        .await?;
    info!(
        "Budget {} set to {} (auto shutdown: {}) for {}",
        name, settings.amount, settings.auto_shut, user.email
    );

    Ok((group, budget))
}

/// Subscription and resource group named by a budget alert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertScope {
    pub subscription_id: String,
    pub resource_group: String,
}

/// Reads `data.context.resourceId`, `data.context.resourceGroupName` or
/// `properties.context.resourceUri`; the scope path is
/// `/subscriptions/{sub}/resourceGroups/{group}`.
pub fn alert_scope(payload: &Value) -> Option<AlertScope> {
    let scope = [
        "/data/context/resourceId",
        "/data/context/resourceGroupName",
        "/properties/context/resourceUri",
    ]
    .iter()
    .filter_map(|pointer| payload.pointer(pointer).and_then(Value::as_str))
    .find(|s| !s.is_empty())?;

    let parts: Vec<&str> = scope.split('/').collect();
    let subscription_id = parts.get(2).filter(|s| !s.is_empty())?;
    let resource_group = parts.get(4).filter(|s| !s.is_empty())?;

    Some(AlertScope {
        subscription_id: subscription_id.to_string(),
        resource_group: resource_group.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertOutcome {
    AutoStopDisabled,
    NoApps,
    Stopped { stopped: usize, failed: usize },
}

/// Stop every deployed app of the alerted group with the owner's token
pub async fn handle_budget_alert(state: &AppState, scope: &AlertScope) -> Result<AlertOutcome, ApiError> {
    let subscription = state
        .store
        .find_subscription(&scope.subscription_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Unknown subscription"))?;

    let group = state
        .store
        .find_resource_group_in_subscription(&scope.subscription_id, &scope.resource_group)
        .await?
        .ok_or_else(|| ApiError::not_found("Resource group not tracked"))?;

    if !group.auto_stop {
        info!("Budget alert for {} ignored: auto shutdown is off", group.name);
        return Ok(AlertOutcome::AutoStopDisabled);
    }

    let owner = state
        .store
        .find_user(subscription.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    let token = access_token(state, &owner).await?;

    let apps: Vec<App> = state
        .store
        .list_apps_in_resource_group(&scope.subscription_id, &scope.resource_group)
        .await?
        .into_iter()
        .filter(|app| app.user_id == owner.id && app.app_name.is_some())
        .collect();

    if apps.is_empty() {
        return Ok(AlertOutcome::NoApps);
    }

    let results = join_all(apps.iter().map(|app| stop_app(state, &token, app))).await;
    let stopped = results.iter().filter(|ok| **ok).count();
    let failed = results.len() - stopped;

    warn!(
        "Budget exceeded for {}: stopped {} apps ({} failed)",
        group.name, stopped, failed
    );
    Ok(AlertOutcome::Stopped { stopped, failed })
}

async fn stop_app(state: &AppState, token: &str, app: &App) -> bool {
    let Some(site) = SiteRef::for_app(app) else {
        return false;
    };
    match state.azure.site_action(token, site, SiteAction::Stop).await {
        Ok(_) => true,
        Err(e) => {
            error!("Failed to stop {} ({}): {}", site.name, app.id, e);
            false
        }
    }
}

/// One app's line in the sweep report
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum SweepEntry {
    Checked {
        #[serde(rename = "appId")]
        app_id: Uuid,
        stopped: bool,
        cost: f64,
        budget: f64,
    },
    Failed {
        #[serde(rename = "appId")]
        app_id: Uuid,
        error: String,
    },
}

/// Check every budgeted app's month-to-date cost and stop the ones over
/// budget with auto-stop enabled. One app failing never stops the sweep.
pub async fn run_budget_sweep(state: &AppState) -> Result<Vec<SweepEntry>, ApiError> {
    let apps = state.store.list_all_apps().await?;
    let mut tokens: HashMap<Uuid, Option<String>> = HashMap::new();
    let mut report = Vec::new();

    for app in apps.iter().filter(|app| app.has_budget()) {
        let Some(site) = SiteRef::for_app(app) else {
            continue;
        };

        let token = match tokens.get(&app.user_id) {
            Some(cached) => cached.clone(),
            None => {
                let resolved = owner_token(state, app.user_id).await;
                tokens.insert(app.user_id, resolved.clone());
                resolved
            }
        };
        let Some(token) = token else {
            continue;
        };

        let cost = match state.azure.site_cost(&token, site).await {
            Ok(cost) => cost,
            Err(e) => {
                warn!("Cost check failed for {} ({}): {}", site.name, app.id, e);
                report.push(SweepEntry::Failed {
                    app_id: app.id,
                    error: e.to_string(),
                });
                continue;
            }
        };

        if let Err(e) = state.store.update_app_cost(app.id, cost).await {
            warn!("Could not record cost for {}: {}", app.id, e);
        }

        if cost > app.budget && app.auto_stop {
            let stopped = stop_app(state, &token, app).await;
            info!(
                "{} is over budget ({:.2} > {:.2}), stopped: {}",
                site.name, cost, app.budget, stopped
            );
            report.push(SweepEntry::Checked {
                app_id: app.id,
                stopped,
                cost,
                budget: app.budget,
            });
        }
    }

    Ok(report)
}

/// None when the owner is gone, unlinked, or their token cannot be refreshed
async fn owner_token(state: &AppState, user_id: Uuid) -> Option<String> {
    let user = match state.store.find_user(user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return None,
        Err(e) => {
            error!("Could not load user {}: {}", user_id, e);
            return None;
        }
    };
    user.azure_link()?;

    match access_token(state, &user).await {
        Ok(token) => Some(token),
        Err(e) => {
            warn!("Skipping apps of {}: {}", user.email, e);
            None
        }
    }
}
