use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};

use super::{expect_success, AzureClient, AzureError};

/// Installs production dependencies inside the deployed site
pub const NPM_INSTALL_COMMAND: &str = "bash -c \"cd /home/site/wwwroot && npm ci --only=production\"";

impl AzureClient {
    fn kudu_base(&self, app_name: &str) -> String {
        self.config.kudu_url_template.replace("{app}", app_name)
    }

    /// Asynchronous zip deploy; the body is JSON when Kudu returns JSON, text otherwise
    pub async fn zip_deploy(&self, token: &str, app_name: &str, bundle: Vec<u8>) -> Result<Value, AzureError> {
        let url = format!("{}/api/zipdeploy?isAsync=true", self.kudu_base(app_name));
        let request = self
            .http
            .post(url)
            .bearer_auth(token)
            .header(CONTENT_TYPE, "application/zip")
            .body(bundle);
        expect_success(self.send(request).await?).await
    }

    pub async fn run_command(&self, token: &str, app_name: &str, command: &str) -> Result<Value, AzureError> {
        let url = format!("{}/api/command", self.kudu_base(app_name));
        let request = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&json!({ "command": command }));
        expect_success(self.send(request).await?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure::testing::mock_config;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn zip_deploy_posts_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/scm/shop/api/zipdeploy"))
            .and(query_param("isAsync", "true"))
            .and(header("content-type", "application/zip"))
            .respond_with(ResponseTemplate::new(202).set_body_string("Deployment queued"))
            .mount(&server)
            .await;

        let client = AzureClient::new(mock_config(&server.uri())).unwrap();
        let body = client.zip_deploy("tok", "shop", b"PK\x03\x04".to_vec()).await.unwrap();
        assert_eq!(body, Value::String("Deployment queued".into()));
    }

    #[tokio::test]
    async fn command_body_is_wrapped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/scm/shop/api/command"))
            .and(body_json(json!({"command": NPM_INSTALL_COMMAND})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ExitCode": 0, "Output": "ok"})))
            .mount(&server)
            .await;

        let client = AzureClient::new(mock_config(&server.uri())).unwrap();
        let body = client.run_command("tok", "shop", NPM_INSTALL_COMMAND).await.unwrap();
        assert_eq!(body["ExitCode"], 0);
    }

    #[tokio::test]
    async fn failed_deploy_keeps_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .mount(&server)
            .await;

        let client = AzureClient::new(mock_config(&server.uri())).unwrap();
        match client.zip_deploy("tok", "shop", vec![1, 2, 3]).await {
            Err(AzureError::Api { status, body }) => {
                assert_eq!(status, 401);
                assert_eq!(body, Value::String("Unauthorized".into()));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
