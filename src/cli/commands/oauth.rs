use anyhow::Context;
use chrono::Duration;
use serde_json::json;

use crate::auth::{generate_jwt, Claims};
use crate::cli::utils::{load_state, output_success};
use crate::cli::OutputFormat;

/// Consent URL with a fresh signed state. Completing the flow still needs the
/// state cookie, so this is for checking tenant and client setup.
pub async fn oauth_url(email: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let state = load_state().await?;
    let user = state
        .store
        .find_user_by_email(email)
        .await?
        .with_context(|| format!("no user registered as {}", email))?;

    let claims = Claims::oauth_state(user.id, user.email.clone(), Duration::minutes(10));
    let oauth_state = generate_jwt(&claims, &state.config.security)?;
    let url = state.azure.authorize_url(user.oauth_client(), &oauth_state)?;

    if let OutputFormat::Text = output_format {
        println!("{}", url);
    }
    output_success(output_format, "Consent URL generated", Some(json!({ "url": url })))
}
