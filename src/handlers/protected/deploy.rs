// handlers/protected/deploy.rs - Bundle validation and Kudu zip deploys
//
// All three routes take multipart/form-data with the archive in the `zip` part.

use axum::{
    extract::{Multipart, State},
    Extension, Json,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::services::azure_session::user_with_token;
use crate::services::bundle::{validate_bundle, AppType};
use crate::services::deploy::{deploy_bundle, InstallStep};
use crate::services::web_app::owned_app;
use crate::state::AppState;

/// Parsed form: the `zip` part as bytes, every other part as text
#[derive(Debug, Default)]
struct Upload {
    zip: Option<Vec<u8>>,
    fields: HashMap<String, String>,
}

impl Upload {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut upload = Upload::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == "zip" {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Could not read ZIP upload: {}", e)))?;
                upload.zip = Some(bytes.to_vec());
            } else {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Could not read field {}: {}", name, e)))?;
                upload.fields.insert(name, text);
            }
        }
        Ok(upload)
    }

    fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
    }

    fn app_type(&self) -> Result<Option<AppType>, ApiError> {
        self.field("appType").map(str::parse::<AppType>).transpose().map_err(ApiError::from)
    }

    fn app_id(&self) -> Result<Uuid, ApiError> {
        self.field("appId")
            .ok_or_else(|| ApiError::bad_request("Missing zip or appId"))?
            .parse()
            .map_err(|_| ApiError::invalid_field("appId", "Not a valid app id"))
    }
}

/// POST /api/deploy/validate-zip - Check a bundle's layout for `appType` (react, node, next)
pub async fn validate_zip_post(multipart: Multipart) -> Result<Json<Value>, ApiError> {
    let upload = Upload::read(multipart).await?;
    let (zip, app_type) = match (upload.zip.as_deref(), upload.app_type()?) {
        (Some(zip), Some(app_type)) => (zip, app_type),
        _ => return Err(ApiError::bad_request("Missing ZIP file or app type.")),
    };

    validate_bundle(zip, app_type)?;
    Ok(Json(json!({ "success": true, "message": "ZIP is valid." })))
}

/**
 * POST /api/deploy/upload-and-deploy - Zip deploy, then `npm ci` on the site
 *
 * Form fields:
 * - `zip`     (file, required)
 * - `appId`   (uuid, required)
 * - `appType` (react|node|next, optional; validates the bundle first)
 */
pub async fn upload_and_deploy_post(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let upload = Upload::read(multipart).await?;
    let app_id = upload.app_id()?;
    let app_type = upload.app_type()?;
    let zip = upload.zip.ok_or_else(|| ApiError::bad_request("Missing required fields."))?;

    let app = owned_app(&state, auth_user.id, app_id).await?;
    let (_, token) = user_with_token(&state, auth_user.id).await?;

    let outcome = deploy_bundle(&state, &token, &app, zip, app_type, InstallStep::NpmInstall).await?;

    Ok(Json(json!({
        "success": true,
        "message": "App deployed successfully!",
        "hostedUrl": outcome.hosted_url,
        "deploymentResult": outcome.deployment,
        "installResult": outcome.install,
    })))
}

/// POST /api/deploy/react-deploy - Zip deploy a static build, no install step
pub async fn react_deploy_post(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let upload = Upload::read(multipart).await?;
    let app_id = upload.app_id()?;
    let zip = upload.zip.ok_or_else(|| ApiError::bad_request("Missing zip or appId"))?;

    let app = owned_app(&state, auth_user.id, app_id).await?;
    let (_, token) = user_with_token(&state, auth_user.id).await?;

    let outcome = deploy_bundle(&state, &token, &app, zip, None, InstallStep::Skip).await?;

    Ok(Json(json!({
        "success": true,
        "message": "React build deployed!",
        "hostedUrl": outcome.hosted_url,
        "details": outcome.deployment,
    })))
}
