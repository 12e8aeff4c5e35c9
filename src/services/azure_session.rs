use tracing::{info, warn};
use uuid::Uuid;

use crate::azure::oauth::OAuthClient;
use crate::database::models::User;
use crate::error::ApiError;
use crate::state::AppState;

pub const NOT_LINKED: &str = "Azure account not linked";
pub const RELINK: &str = "Azure session expired. Please link your Azure account again.";

impl User {
    /// OAuth credentials of the user's own app registration
    pub fn oauth_client(&self) -> OAuthClient<'_> {
        OAuthClient {
            tenant_id: &self.tenant_id,
            client_id: &self.client_id,
            client_secret: &self.client_secret,
        }
    }
}

/// Load the user and a usable ARM access token for them
pub async fn user_with_token(state: &AppState, user_id: Uuid) -> Result<(User, String), ApiError> {
    let user = state
        .store
        .find_user(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    let token = access_token(state, &user).await?;
    Ok((user, token))
}

/// The linked access token, refreshed first when it is about to expire
pub async fn access_token(state: &AppState, user: &User) -> Result<String, ApiError> {
    let link = user.azure_link().ok_or_else(|| ApiError::forbidden(NOT_LINKED))?;

    if !link.expires_within(state.config.azure.token_refresh_skew_secs) {
        return Ok(link.access_token);
    }

    let Some(refresh_token) = link.refresh_token.as_deref() else {
        // Still valid for a few seconds; let it be used until it lapses
        if !link.expires_within(0) {
            return Ok(link.access_token);
        }
        warn!("Azure token for {} expired and no refresh token is stored", user.email);
        return Err(ApiError::forbidden(RELINK));
    };

    let refreshed = state
        .azure
        .refresh_token(user.oauth_client(), refresh_token)
        .await
        .map_err(|e| ApiError::from(e).context("Failed to refresh Azure token"))?;

    state.store.save_azure_link(user.id, &refreshed).await?;
    info!("Refreshed Azure token for {}", user.email);

    Ok(refreshed.access_token)
}
