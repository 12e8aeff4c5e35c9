use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};

use super::{expect_success, list_values, read_body, AzureClient, AzureError};
use crate::database::models::App;

const SUBSCRIPTIONS_API: &str = "2020-01-01";
const RESOURCE_GROUPS_API: &str = "2021-04-01";
const SITES_LIST_API: &str = "2023-01-01";
const WEB_API: &str = "2022-03-01";
const PROVIDERS_API: &str = "2022-01-01";
const BUDGETS_API: &str = "2023-03-01";
const ACTION_GROUPS_API: &str = "2021-09-01";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmSubscription {
    pub subscription_id: String,
    pub display_name: String,
    pub tenant_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArmResourceGroup {
    pub name: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArmSite {
    pub id: String,
    pub name: String,
    pub location: Option<String>,
}

impl ArmSite {
    /// Segment following `/resourceGroups/` in the site's resource id
    pub fn resource_group(&self) -> Option<String> {
        resource_group_from_id(&self.id)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NameAvailability {
    pub name_available: bool,
    pub message: Option<String>,
    pub reason: Option<String>,
}

/// Address of one `Microsoft.Web/sites` resource
#[derive(Debug, Clone, Copy)]
pub struct SiteRef<'a> {
    pub subscription_id: &'a str,
    pub resource_group: &'a str,
    pub name: &'a str,
}

impl<'a> SiteRef<'a> {
    /// None while the app has no Azure site behind it
    pub fn for_app(app: &'a App) -> Option<Self> {
        app.app_name.as_deref().map(|name| Self {
            subscription_id: &app.subscription_id,
            resource_group: &app.resource_group,
            name,
        })
    }

    pub fn path(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Web/sites/{}",
            self.subscription_id, self.resource_group, self.name
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteAction {
    Start,
    Stop,
    Restart,
}

impl SiteAction {
    fn as_str(&self) -> &'static str {
        match self {
            SiteAction::Start => "start",
            SiteAction::Stop => "stop",
            SiteAction::Restart => "restart",
        }
    }
}

/// `/subscriptions/{s}/resourceGroups/{rg}/...` -> `rg` (case-insensitive segment match)
pub fn resource_group_from_id(id: &str) -> Option<String> {
    let mut segments = id.split('/');
    while let Some(segment) = segments.next() {
        if segment.eq_ignore_ascii_case("resourceGroups") {
            return segments.next().filter(|s| !s.is_empty()).map(str::to_string);
        }
    }
    None
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

impl AzureClient {
    pub async fn list_subscriptions(&self, token: &str) -> Result<Vec<ArmSubscription>, AzureError> {
        let url = self.arm_url("/subscriptions", SUBSCRIPTIONS_API);
        let body = expect_success(self.send(self.http.get(url).bearer_auth(token)).await?).await?;

        Ok(list_values(&body)
            .iter()
            .filter_map(|sub| {
                let subscription_id = str_field(sub, "subscriptionId")?;
                Some(ArmSubscription {
                    display_name: str_field(sub, "displayName").unwrap_or_else(|| subscription_id.clone()),
                    tenant_id: str_field(sub, "tenantId").unwrap_or_default(),
                    subscription_id,
                })
            })
            .collect())
    }

    pub async fn list_resource_groups(
        &self,
        token: &str,
        subscription_id: &str,
    ) -> Result<Vec<ArmResourceGroup>, AzureError> {
        let url = self.arm_url(&format!("/subscriptions/{}/resourcegroups", subscription_id), RESOURCE_GROUPS_API);
        let body = expect_success(self.send(self.http.get(url).bearer_auth(token)).await?).await?;

        Ok(list_values(&body)
            .iter()
            .filter_map(|rg| {
                Some(ArmResourceGroup {
                    name: str_field(rg, "name")?,
                    location: str_field(rg, "location"),
                })
            })
            .collect())
    }

    pub async fn create_resource_group(
        &self,
        token: &str,
        subscription_id: &str,
        name: &str,
        location: &str,
    ) -> Result<Value, AzureError> {
        let url = self.arm_url(
            &format!("/subscriptions/{}/resourcegroups/{}", subscription_id, name),
            RESOURCE_GROUPS_API,
        );
        let request = self.http.put(url).bearer_auth(token).json(&json!({ "location": location }));
        expect_success(self.send(request).await?).await
    }

    pub async fn list_web_apps(&self, token: &str, subscription_id: &str) -> Result<Vec<ArmSite>, AzureError> {
        let url = self.arm_url(
            &format!("/subscriptions/{}/providers/Microsoft.Web/sites", subscription_id),
            SITES_LIST_API,
        );
        let body = expect_success(self.send(self.http.get(url).bearer_auth(token)).await?).await?;

        Ok(list_values(&body)
            .iter()
            .filter_map(|site| {
                Some(ArmSite {
                    id: str_field(site, "id")?,
                    name: str_field(site, "name")?,
                    location: str_field(site, "location"),
                })
            })
            .collect())
    }

    pub async fn check_name_availability(
        &self,
        token: &str,
        subscription_id: &str,
        name: &str,
    ) -> Result<NameAvailability, AzureError> {
        let url = self.arm_url(
            &format!("/subscriptions/{}/providers/Microsoft.Web/checkNameAvailability", subscription_id),
            WEB_API,
        );
        let request = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&json!({ "name": name, "type": "Microsoft.Web/sites" }));
        let body = expect_success(self.send(request).await?).await?;

        let name_available = body
            .get("nameAvailable")
            .and_then(Value::as_bool)
            .ok_or_else(|| AzureError::InvalidResponse("checkNameAvailability without nameAvailable".to_string()))?;

        Ok(NameAvailability {
            name_available,
            message: str_field(&body, "message"),
            reason: str_field(&body, "reason"),
        })
    }

    /// Registers `namespace` on the subscription if needed and polls until `Registered`
    pub async fn ensure_provider_registered(
        &self,
        token: &str,
        subscription_id: &str,
        namespace: &str,
    ) -> Result<(), AzureError> {
        let provider_path = format!("/subscriptions/{}/providers/{}", subscription_id, namespace);

        let state = self.provider_state(token, &provider_path).await?;
        if state.as_deref() == Some("Registered") {
            return Ok(());
        }

        info!("Registering resource provider {} on {}", namespace, subscription_id);
        let url = self.arm_url(&format!("{}/register", provider_path), PROVIDERS_API);
        expect_success(self.send(self.http.post(url).bearer_auth(token)).await?).await?;

        let attempts = self.config.provider_poll_attempts;
        for attempt in 1..=attempts {
            tokio::time::sleep(Duration::from_millis(self.config.provider_poll_interval_ms)).await;
            let state = self.provider_state(token, &provider_path).await?;
            if state.as_deref() == Some("Registered") {
                return Ok(());
            }
            warn!(
                "Provider {} not registered yet ({:?}), attempt {}/{}",
                namespace, state, attempt, attempts
            );
        }

        Err(AzureError::InvalidResponse(format!(
            "{} registration did not complete after {} checks",
            namespace, attempts
        )))
    }

    async fn provider_state(&self, token: &str, provider_path: &str) -> Result<Option<String>, AzureError> {
        let url = self.arm_url(provider_path, PROVIDERS_API);
        let body = expect_success(self.send(self.http.get(url).bearer_auth(token)).await?).await?;
        Ok(str_field(&body, "registrationState"))
    }

    /// Existing plan, or a new free Linux plan when the GET answers 404
    pub async fn ensure_linux_plan(
        &self,
        token: &str,
        subscription_id: &str,
        resource_group: &str,
        plan: &str,
        location: &str,
    ) -> Result<Value, AzureError> {
        let url = self.arm_url(
            &format!(
                "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Web/serverfarms/{}",
                subscription_id, resource_group, plan
            ),
            WEB_API,
        );

        let response = self.send(self.http.get(&url).bearer_auth(token)).await?;
        match response.status().as_u16() {
            200 => return Ok(read_body(response).await),
            404 => {}
            status => {
                return Err(AzureError::Api {
                    status,
                    body: read_body(response).await,
                })
            }
        }

        info!("Creating App Service plan {} in {}", plan, resource_group);
        let payload = json!({
            "location": location,
            "sku": { "name": "F1", "tier": "Free", "size": "F1", "family": "F", "capacity": 1 },
            "kind": "linux",
            "properties": { "reserved": true }
        });
        expect_success(self.send(self.http.put(&url).bearer_auth(token).json(&payload)).await?).await
    }

    pub async fn create_linux_web_app(
        &self,
        token: &str,
        site: SiteRef<'_>,
        plan: &str,
        location: &str,
    ) -> Result<Value, AzureError> {
        let server_farm_id = format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Web/serverfarms/{}",
            site.subscription_id, site.resource_group, plan
        );
        let payload = json!({
            "location": location,
            "kind": "app,linux",
            "properties": {
                "serverFarmId": server_farm_id,
                "siteConfig": { "linuxFxVersion": self.config.linux_fx_version }
            }
        });

        let url = self.arm_url(&site.path(), WEB_API);
        expect_success(self.send(self.http.put(url).bearer_auth(token).json(&payload)).await?).await
    }

    /// `properties.state` of the site (`Running`, `Stopped`, ...)
    pub async fn site_state(&self, token: &str, site: SiteRef<'_>) -> Result<String, AzureError> {
        let url = self.arm_url(&site.path(), WEB_API);
        let body = expect_success(self.send(self.http.get(url).bearer_auth(token)).await?).await?;
        body.pointer("/properties/state")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AzureError::InvalidResponse("site without properties.state".to_string()))
    }

    pub async fn site_action(&self, token: &str, site: SiteRef<'_>, action: SiteAction) -> Result<Value, AzureError> {
        let url = self.arm_url(&format!("{}/{}", site.path(), action.as_str()), WEB_API);
        expect_success(self.send(self.http.post(url).bearer_auth(token)).await?).await
    }

    /// `Stopped` starts the site, `Running` restarts it
    pub async fn start_or_restart(&self, token: &str, site: SiteRef<'_>) -> Result<SiteAction, AzureError> {
        let action = match self.site_state(token, site).await?.as_str() {
            "Stopped" => SiteAction::Start,
            "Running" => SiteAction::Restart,
            other => return Err(AzureError::UnhandledState(other.to_string())),
        };
        self.site_action(token, site, action).await?;
        Ok(action)
    }

    pub async fn delete_site(&self, token: &str, site: SiteRef<'_>) -> Result<(), AzureError> {
        let url = self.arm_url(&site.path(), WEB_API);
        expect_success(self.send(self.http.delete(url).bearer_auth(token)).await?).await?;
        Ok(())
    }

    pub async fn update_app_settings(
        &self,
        token: &str,
        site: SiteRef<'_>,
        settings: &BTreeMap<String, String>,
    ) -> Result<Value, AzureError> {
        let url = self.arm_url(&format!("{}/config/appsettings", site.path()), WEB_API);
        let request = self
            .http
            .put(url)
            .bearer_auth(token)
            .json(&json!({ "properties": settings }));
        expect_success(self.send(request).await?).await
    }

    /// Upserts `microsoft.insights/actionGroups/{name}` with one webhook receiver; returns its id
    pub async fn upsert_action_group(
        &self,
        token: &str,
        subscription_id: &str,
        resource_group: &str,
        name: &str,
        webhook_uri: &str,
    ) -> Result<String, AzureError> {
        let url = self.arm_url(
            &format!(
                "/subscriptions/{}/resourceGroups/{}/providers/microsoft.insights/actionGroups/{}",
                subscription_id, resource_group, name
            ),
            ACTION_GROUPS_API,
        );
        let payload = json!({
            "location": "global",
            "properties": {
                "groupShortName": short_name(name),
                "enabled": true,
                "webhookReceivers": [{
                    "name": "autoShutdownWebhook",
                    "serviceUri": webhook_uri,
                    "useCommonAlertSchema": true
                }]
            }
        });

        let body = expect_success(self.send(self.http.put(url).bearer_auth(token).json(&payload)).await?).await?;
        str_field(&body, "id").ok_or_else(|| AzureError::InvalidResponse("action group without id".to_string()))
    }

    pub async fn upsert_budget(
        &self,
        token: &str,
        subscription_id: &str,
        resource_group: &str,
        name: &str,
        payload: &Value,
    ) -> Result<Value, AzureError> {
        let url = self.arm_url(
            &format!(
                "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Consumption/budgets/{}",
                subscription_id, resource_group, name
            ),
            BUDGETS_API,
        );
        expect_success(self.send(self.http.put(url).bearer_auth(token).json(payload)).await?).await
    }
}

/// Action group short names are capped at 12 characters
fn short_name(name: &str) -> String {
    name.chars().take(12).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure::testing::mock_config;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SITE: SiteRef<'static> = SiteRef {
        subscription_id: "sub-1",
        resource_group: "rg-1",
        name: "shop",
    };

    #[test]
    fn parses_resource_group_segment() {
        assert_eq!(
            resource_group_from_id("/subscriptions/s/resourceGroups/rg-a/providers/Microsoft.Web/sites/x").as_deref(),
            Some("rg-a")
        );
        assert_eq!(
            resource_group_from_id("/subscriptions/s/resourcegroups/rg-b").as_deref(),
            Some("rg-b")
        );
        assert!(resource_group_from_id("/subscriptions/s").is_none());
    }

    #[test]
    fn short_name_is_truncated() {
        assert_eq!(short_name("budget-production"), "budget-produ");
        assert_eq!(short_name("budget-a"), "budget-a");
    }

    #[tokio::test]
    async fn lists_sites_with_resource_groups() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/subscriptions/sub-1/providers/Microsoft.Web/sites"))
            .and(query_param("api-version", "2023-01-01"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [
                    {"id": "/subscriptions/sub-1/resourceGroups/rg-1/providers/Microsoft.Web/sites/shop", "name": "shop", "location": "West Europe"},
                    {"name": "no-id"}
                ]
            })))
            .mount(&server)
            .await;

        let client = AzureClient::new(mock_config(&server.uri())).unwrap();
        let sites = client.list_web_apps("tok", "sub-1").await.unwrap();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].resource_group().as_deref(), Some("rg-1"));
    }

    #[tokio::test]
    async fn plan_is_created_on_404_only() {
        let server = MockServer::start().await;
        let plan_path = "/subscriptions/sub-1/resourceGroups/rg-1/providers/Microsoft.Web/serverfarms/plan";
        Mock::given(method("GET"))
            .and(path(plan_path))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(plan_path))
            .and(body_partial_json(json!({"kind": "linux", "sku": {"name": "F1"}, "properties": {"reserved": true}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "plan"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = AzureClient::new(mock_config(&server.uri())).unwrap();
        let plan = client.ensure_linux_plan("tok", "sub-1", "rg-1", "plan", "centralindia").await.unwrap();
        assert_eq!(plan["name"], "plan");
    }

    #[tokio::test]
    async fn plan_lookup_failure_keeps_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({"error": {"code": "AuthorizationFailed"}})))
            .mount(&server)
            .await;

        let client = AzureClient::new(mock_config(&server.uri())).unwrap();
        let err = client.ensure_linux_plan("tok", "sub-1", "rg-1", "plan", "x").await.unwrap_err();
        assert_eq!(err.status(), Some(403));
    }

    #[tokio::test]
    async fn provider_registration_polls_until_registered() {
        let server = MockServer::start().await;
        let provider = "/subscriptions/sub-1/providers/Microsoft.Web";
        Mock::given(method("GET"))
            .and(path(provider))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"registrationState": "NotRegistered"})))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(provider))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"registrationState": "Registered"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("{}/register", provider)))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = AzureClient::new(mock_config(&server.uri())).unwrap();
        client.ensure_provider_registered("tok", "sub-1", "Microsoft.Web").await.unwrap();
    }

    #[tokio::test]
    async fn restart_depends_on_state() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SITE.path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"properties": {"state": "Stopped"}})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("{}/start", SITE.path())))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = AzureClient::new(mock_config(&server.uri())).unwrap();
        let action = client.start_or_restart("tok", SITE).await.unwrap();
        assert_eq!(action, SiteAction::Start);
    }

    #[tokio::test]
    async fn unknown_state_is_not_acted_on() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SITE.path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"properties": {"state": "Starting"}})))
            .mount(&server)
            .await;

        let client = AzureClient::new(mock_config(&server.uri())).unwrap();
        let err = client.start_or_restart("tok", SITE).await.unwrap_err();
        assert!(matches!(err, AzureError::UnhandledState(state) if state == "Starting"));
    }
}
