#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::MockServer;

use azora_api::config::AppConfig;
use azora_api::database::models::AzureLink;
use azora_api::database::MemoryStore;
use azora_api::{app, AppState};

pub const WEBHOOK_KEY: &str = "test-webhook-key";
pub const ARM_TOKEN: &str = "arm-access-token";
pub const SUBSCRIPTION: &str = "sub-1";

/// One server per test: its own in-memory store and its own mock Azure
pub struct TestApp {
    pub base_url: String,
    pub state: AppState,
    pub azure: MockServer,
    pub client: reqwest::Client,
}

/// Logged-in user: the `token` cookie plus the id the server assigned
pub struct Session {
    pub cookie: String,
    pub user_id: Uuid,
    pub email: String,
}

impl TestApp {
    pub async fn spawn() -> Result<Self> {
        let azure = MockServer::start().await;
        let base = azure.uri();

        let mut config = AppConfig::development();
        config.api.public_base_url = "http://dashboard.test".to_string();
        config.budget.webhook_key = WEBHOOK_KEY.to_string();
        config.azure.management_url = base.clone();
        config.azure.login_url = format!("{}/login", base);
        config.azure.kudu_url_template = format!("{}/scm/{{app}}", base);
        config.azure.retry_base_delay_ms = 1;
        config.azure.provider_poll_interval_ms = 1;

        let state = AppState::new(config, Arc::new(MemoryStore::new()))?;

        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test listener")?;
        let router = app(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            base_url: format!("http://127.0.0.1:{}", port),
            state,
            azure,
            client,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Request carrying the session cookie
    pub fn request(&self, method: Method, path: &str, session: &Session) -> RequestBuilder {
        self.client.request(method, self.url(path)).header(COOKIE, &session.cookie)
    }

    pub async fn register(&self, email: &str) -> Result<Session> {
        let res = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&json!({
                "email": email,
                "password": "password123",
                "name": "Dev",
                "clientId": "client-1",
                "clientSecret": "client-secret",
                "tenantId": "tenant-1",
            }))
            .send()
            .await?;
        anyhow::ensure!(res.status().is_success(), "register failed: {}", res.status());

        let cookie = session_cookie(&res).context("register did not set a session cookie")?;
        let body: Value = res.json().await?;
        let user_id = body["data"]["id"]
            .as_str()
            .context("register response without user id")?
            .parse()?;

        Ok(Session {
            cookie,
            user_id,
            email: email.to_string(),
        })
    }

    /// Store an ARM token as if the OAuth callback had completed
    pub async fn link_azure(&self, session: &Session) -> Result<()> {
        let link = AzureLink {
            access_token: ARM_TOKEN.to_string(),
            refresh_token: Some("arm-refresh-token".to_string()),
            expires_at: Some(Utc::now() + Duration::hours(1)),
            tenant_id: "tenant-1".to_string(),
        };
        self.state.store.save_azure_link(session.user_id, &link).await?;
        Ok(())
    }

    /// Registered, linked user with one draft app in `rg-1`
    pub async fn user_with_app(&self, email: &str, app_name: &str, budget: f64) -> Result<(Session, Uuid)> {
        let session = self.register(email).await?;
        self.link_azure(&session).await?;
        let app_id = self.create_app(&session, app_name, budget).await?;
        Ok((session, app_id))
    }

    pub async fn create_app(&self, session: &Session, name: &str, budget: f64) -> Result<Uuid> {
        let res = self
            .request(Method::POST, "/api/apps", session)
            .json(&json!({
                "name": name,
                "subscriptionId": SUBSCRIPTION,
                "resourceGroup": "rg-1",
                "appServiceName": format!("{}-svc", name),
                "budget": budget,
            }))
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::CREATED, "create app failed: {}", res.status());
        let body: Value = res.json().await?;
        Ok(body["data"]["id"].as_str().context("app without id")?.parse()?)
    }

    /// Attach an Azure site to a draft app without going through ARM
    pub async fn mark_deployed(&self, app_id: Uuid, site_name: &str) -> Result<()> {
        self.state.store.mark_app_deployed(app_id, site_name).await?;
        Ok(())
    }
}

/// `token=...` from the response's Set-Cookie headers
pub fn session_cookie(res: &Response) -> Option<String> {
    set_cookies(res)
        .into_iter()
        .find(|c| c.starts_with("token=") && !c.starts_with("token=;"))
        .and_then(|c| c.split(';').next().map(str::to_string))
}

pub fn set_cookies(res: &Response) -> Vec<String> {
    res.headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// ARM path of a site in `rg-1`
pub fn site_path(site: &str) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/rg-1/providers/Microsoft.Web/sites/{}",
        SUBSCRIPTION, site
    )
}

/// Minimal ZIP archive for upload tests
pub fn zip_of(files: &[(&str, &str)]) -> Result<Vec<u8>> {
    use std::io::Write;

    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, contents) in files {
        writer.start_file(*name, options)?;
        writer.write_all(contents.as_bytes())?;
    }
    Ok(writer.finish()?.into_inner())
}
