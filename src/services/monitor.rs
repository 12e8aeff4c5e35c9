use std::str::FromStr;
use tracing::info;

use crate::azure::{SiteAction, SiteRef};
use crate::database::models::{App, AppSettingsUpdate};
use crate::error::ApiError;
use crate::state::AppState;

pub const NOT_DEPLOYED: &str = "App has not been deployed to Azure yet";

/// Operations the monitor page can trigger on a site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    Stop,
    Restart,
    Delete,
}

impl FromStr for AppAction {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stop" => Ok(AppAction::Stop),
            "restart" => Ok(AppAction::Restart),
            "delete" => Ok(AppAction::Delete),
            _ => Err(ApiError::bad_request("Invalid action")),
        }
    }
}

pub fn site_of(app: &App) -> Result<SiteRef<'_>, ApiError> {
    SiteRef::for_app(app).ok_or_else(|| ApiError::bad_request(NOT_DEPLOYED))
}

/// Month-to-date cost of the app's site, saved as its current cost
pub async fn refresh_cost(state: &AppState, token: &str, app: &App) -> Result<f64, ApiError> {
    let cost = state
        .azure
        .site_cost(token, site_of(app)?)
        .await
        .map_err(|e| ApiError::from(e).context("Failed to fetch data"))?;
    state.store.update_app_cost(app.id, cost).await?;
    Ok(cost)
}

/// Env vars go to Azure first; local settings are only saved once Azure accepted them
pub async fn update_settings(
    state: &AppState,
    token: &str,
    app: &App,
    update: AppSettingsUpdate,
) -> Result<App, ApiError> {
    if let Some(env) = &update.env_vars {
        // Azure replaces the whole settings collection, so send the merged map
        let mut merged = app.env_vars.0.clone();
        merged.extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));

        state
            .azure
            .update_app_settings(token, site_of(app)?, &merged)
            .await
            .map_err(|e| ApiError::from(e).context("Failed to update environment variables"))?;
    }

    Ok(state.store.update_app_settings(app.id, update).await?)
}

/// Run `action` against the site; returns the message shown to the user
pub async fn control_app(state: &AppState, token: &str, app: &App, action: AppAction) -> Result<String, ApiError> {
    let site = site_of(app)?;

    let message = match action {
        AppAction::Stop => {
            state
                .azure
                .site_action(token, site, SiteAction::Stop)
                .await
                .map_err(|e| ApiError::from(e).context("Failed to stop app"))?;
            "Action 'stop' completed.".to_string()
        }
        AppAction::Restart => match state.azure.start_or_restart(token, site).await {
            Ok(SiteAction::Start) => "App started successfully".to_string(),
            Ok(_) => "App restarted successfully".to_string(),
            Err(e) => return Err(ApiError::from(e).context("Failed to restart app")),
        },
        AppAction::Delete => {
            state
                .azure
                .delete_site(token, site)
                .await
                .map_err(|e| ApiError::from(e).context("Failed to delete app"))?;
            state.store.delete_app(app.id).await?;
            "Action 'delete' completed.".to_string()
        }
    };

    info!("{:?} on {} ({})", action, site.name, app.id);
    Ok(message)
}
