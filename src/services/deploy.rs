use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::azure::kudu::NPM_INSTALL_COMMAND;
use crate::config::AppConfig;
use crate::database::models::App;
use crate::error::ApiError;
use crate::services::bundle::{validate_bundle, AppType};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DeployOutcome {
    pub hosted_url: String,
    pub deployment: Value,
    /// Kudu's answer to the post-deploy install, when one ran
    pub install: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStep {
    /// `npm ci --only=production` in `wwwroot` after the zip lands
    NpmInstall,
    Skip,
}

/// Zip-deploy `bundle` to the app's site, optionally validating it first and
/// installing dependencies afterwards. A failing install is logged, not fatal.
pub async fn deploy_bundle(
    state: &AppState,
    token: &str,
    app: &App,
    bundle: Vec<u8>,
    app_type: Option<AppType>,
    install: InstallStep,
) -> Result<DeployOutcome, ApiError> {
    let site_name = app
        .app_name
        .as_deref()
        .ok_or_else(|| ApiError::not_found("App not found"))?;

    if let Some(app_type) = app_type {
        validate_bundle(&bundle, app_type)?;
    }

    info!("Deploying {} bytes to {}", bundle.len(), site_name);
    let deployment = state
        .azure
        .zip_deploy(token, site_name, bundle)
        .await
        .map_err(|e| ApiError::from(e).context("Deployment failed"))?;

    let install = match install {
        InstallStep::Skip => None,
        InstallStep::NpmInstall => match state.azure.run_command(token, site_name, NPM_INSTALL_COMMAND).await {
            Ok(output) => {
                info!("Install on {} finished: {}", site_name, output);
                Some(output)
            }
            Err(e) => {
                warn!("Install on {} failed: {}", site_name, e);
                None
            }
        },
    };

    Ok(DeployOutcome {
        hosted_url: AppConfig::hosted_url(site_name),
        deployment,
        install,
    })
}
