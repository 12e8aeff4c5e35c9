use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::azure::SiteRef;
use crate::database::models::{App, User};
use crate::error::ApiError;
use crate::state::AppState;

const WEB_PROVIDER: &str = "Microsoft.Web";

/// Where to put a new Linux web app
#[derive(Debug, Clone)]
pub struct WebAppRequest {
    pub app_id: Uuid,
    pub site_name: String,
    pub subscription_id: String,
    pub resource_group: String,
}

pub struct ProvisionedWebApp {
    pub app: App,
    pub site: Value,
}

/// Register `Microsoft.Web`, make sure the free Linux plan exists, create the
/// site and mark the app as no longer a draft.
pub async fn create_web_app(
    state: &AppState,
    user: &User,
    token: &str,
    request: WebAppRequest,
) -> Result<ProvisionedWebApp, ApiError> {
    let app = owned_app(state, user.id, request.app_id).await?;
    if app.subscription_id != request.subscription_id || app.resource_group != request.resource_group {
        return Err(ApiError::bad_request(
            "Subscription and resource group must match the app's settings",
        ));
    }

    let location = state
        .store
        .find_resource_groups(user.id, &request.resource_group)
        .await?
        .into_iter()
        .find(|rg| rg.subscription_id == request.subscription_id)
        .and_then(|rg| rg.location)
        .unwrap_or_else(|| state.config.azure.default_location.clone());

    let azure = &state.azure;
    let plan = &state.config.azure.app_service_plan;

    azure
        .ensure_provider_registered(token, &request.subscription_id, WEB_PROVIDER)
        .await
        .map_err(|e| ApiError::from(e).context("Failed to register Microsoft.Web provider"))?;

    azure
        .ensure_linux_plan(token, &request.subscription_id, &request.resource_group, plan, &location)
        .await
        .map_err(|e| ApiError::from(e).context("Failed to create Linux service plan"))?;

    let site_ref = SiteRef {
        subscription_id: &request.subscription_id,
        resource_group: &request.resource_group,
        name: &request.site_name,
    };
    let site = azure
        .create_linux_web_app(token, site_ref, plan, &location)
        .await
        .map_err(|e| ApiError::from(e).context("Failed to create Linux Web App."))?;

    let app = state.store.mark_app_deployed(app.id, &request.site_name).await?;
    info!("Created web app {} in {} for {}", request.site_name, request.resource_group, user.email);

    Ok(ProvisionedWebApp { app, site })
}

/// The app, if it exists and belongs to `user_id`
pub async fn owned_app(state: &AppState, user_id: Uuid, app_id: Uuid) -> Result<App, ApiError> {
    state
        .store
        .find_app(app_id)
        .await?
        .filter(|app| app.user_id == user_id)
        .ok_or_else(|| ApiError::not_found("App not found"))
}
