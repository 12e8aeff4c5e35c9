use chrono::{Duration, Utc};
use serde::Deserialize;
use url::Url;

use super::{expect_success, AzureClient, AzureError};
use crate::database::models::AzureLink;

const AUTHORIZE_SCOPE: &str = "https://management.azure.com/user_impersonation offline_access";
const TOKEN_SCOPE: &str = "https://management.azure.com/.default offline_access openid profile";

/// The user's own Azure AD app registration
#[derive(Debug, Clone, Copy)]
pub struct OAuthClient<'a> {
    pub tenant_id: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

impl AzureClient {
    /// Authorization-code consent URL for the user's tenant
    pub fn authorize_url(&self, client: OAuthClient<'_>, state: &str) -> Result<String, AzureError> {
        let base = format!("{}/{}/oauth2/v2.0/authorize", self.config.login_url, client.tenant_id);
        let url = Url::parse_with_params(
            &base,
            &[
                ("client_id", client.client_id),
                ("response_type", "code"),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_mode", "query"),
                ("scope", AUTHORIZE_SCOPE),
                ("state", state),
            ],
        )
        .map_err(|e| AzureError::InvalidResponse(format!("invalid login url: {}", e)))?;
        Ok(url.into())
    }

    pub async fn exchange_code(&self, client: OAuthClient<'_>, code: &str) -> Result<AzureLink, AzureError> {
        self.token_request(
            client,
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ],
            None,
        )
        .await
    }

    /// Refresh grant; Entra ID may omit a new refresh token, in which case the old one is kept
    pub async fn refresh_token(&self, client: OAuthClient<'_>, refresh_token: &str) -> Result<AzureLink, AzureError> {
        self.token_request(
            client,
            &[("grant_type", "refresh_token"), ("refresh_token", refresh_token)],
            Some(refresh_token),
        )
        .await
    }

    async fn token_request(
        &self,
        client: OAuthClient<'_>,
        grant: &[(&str, &str)],
        previous_refresh: Option<&str>,
    ) -> Result<AzureLink, AzureError> {
        let url = format!("{}/{}/oauth2/v2.0/token", self.config.login_url, client.tenant_id);

        let mut form: Vec<(&str, &str)> = vec![
            ("client_id", client.client_id),
            ("client_secret", client.client_secret),
            ("scope", TOKEN_SCOPE),
        ];
        form.extend_from_slice(grant);

        let body = expect_success(self.send(self.http.post(url).form(&form)).await?).await?;
        let token: TokenResponse =
            serde_json::from_value(body).map_err(|e| AzureError::InvalidResponse(format!("token response: {}", e)))?;

        Ok(AzureLink {
            access_token: token.access_token,
            refresh_token: token.refresh_token.or_else(|| previous_refresh.map(str::to_string)),
            expires_at: token.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
            tenant_id: client.tenant_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure::testing::mock_config;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CLIENT: OAuthClient<'static> = OAuthClient {
        tenant_id: "tenant-1",
        client_id: "client-1",
        client_secret: "s3cret",
    };

    #[test]
    fn authorize_url_carries_state_and_scope() {
        let client = AzureClient::new(mock_config("http://login.test")).unwrap();
        let url = Url::parse(&client.authorize_url(CLIENT, "xyz").unwrap()).unwrap();

        assert_eq!(url.path(), "/login/tenant-1/oauth2/v2.0/authorize");
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["state"], "xyz");
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["scope"], AUTHORIZE_SCOPE);
    }

    #[tokio::test]
    async fn exchanges_code_for_link() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login/tenant-1/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "at", "refresh_token": "rt", "expires_in": 3600
            })))
            .mount(&server)
            .await;

        let client = AzureClient::new(mock_config(&server.uri())).unwrap();
        let link = client.exchange_code(CLIENT, "abc").await.unwrap();
        assert_eq!(link.access_token, "at");
        assert_eq!(link.refresh_token.as_deref(), Some("rt"));
        assert!(!link.expires_within(60));
    }

    #[tokio::test]
    async fn refresh_keeps_old_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "at2", "expires_in": 3600})))
            .mount(&server)
            .await;

        let client = AzureClient::new(mock_config(&server.uri())).unwrap();
        let link = client.refresh_token(CLIENT, "rt-old").await.unwrap();
        assert_eq!(link.access_token, "at2");
        assert_eq!(link.refresh_token.as_deref(), Some("rt-old"));
    }

    #[tokio::test]
    async fn token_error_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})))
            .mount(&server)
            .await;

        let client = AzureClient::new(mock_config(&server.uri())).unwrap();
        let err = client.exchange_code(CLIENT, "bad").await.unwrap_err();
        assert_eq!(err.status(), Some(400));
    }
}
