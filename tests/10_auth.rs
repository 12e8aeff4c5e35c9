mod common;

use anyhow::Result;
use reqwest::header::LOCATION;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, ResponseTemplate};

use common::{session_cookie, set_cookies, TestApp};

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let app = TestApp::spawn().await?;

    let res = app.client.get(app.url("/health")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await?;
    assert_eq!(body["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn register_starts_a_session() -> Result<()> {
    let app = TestApp::spawn().await?;
    let session = app.register("ada@example.com").await?;

    let res = app.request(Method::GET, "/api/auth/me", &session).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await?;
    assert_eq!(body["data"]["email"], "ada@example.com");
    assert_eq!(body["data"]["isDevOps"], false);
    assert!(body["data"].get("passwordHash").is_none());
    assert!(body["data"].get("clientSecret").is_none());
    Ok(())
}

#[tokio::test]
async fn register_requires_azure_app_fields() -> Result<()> {
    let app = TestApp::spawn().await?;

    let res = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&json!({ "email": "ada@example.com", "password": "password123", "name": "Ada" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body: Value = res.json().await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["field_errors"]["clientId"], "Required");
    assert_eq!(body["field_errors"]["tenantId"], "Required");
    Ok(())
}

#[tokio::test]
async fn register_existing_email_logs_in_or_rejects() -> Result<()> {
    let app = TestApp::spawn().await?;
    app.register("ada@example.com").await?;

    // Same password: logged in again
    let again = app.register("ada@example.com").await?;
    assert!(!again.cookie.is_empty());

    let res = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&json!({ "email": "ada@example.com", "password": "wrong-password" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn login_checks_password() -> Result<()> {
    let app = TestApp::spawn().await?;
    app.register("ada@example.com").await?;

    let bad = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({ "email": "ada@example.com", "password": "not-it-at-all" }))
        .send()
        .await?;
    assert_eq!(bad.status(), StatusCode::UNAUTHORIZED);
    assert!(session_cookie(&bad).is_none());

    let good = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({ "email": "ada@example.com", "password": "password123" }))
        .send()
        .await?;
    assert_eq!(good.status(), StatusCode::OK);

    let cookie = set_cookies(&good).into_iter().find(|c| c.starts_with("token=")).unwrap_or_default();
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
    Ok(())
}

#[tokio::test]
async fn protected_routes_need_a_session() -> Result<()> {
    let app = TestApp::spawn().await?;

    let res = app.client.get(app.url("/api/apps")).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = app
        .client
        .get(app.url("/api/apps"))
        .header("Cookie", "token=not-a-jwt")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn bearer_header_is_accepted() -> Result<()> {
    let app = TestApp::spawn().await?;
    let session = app.register("ada@example.com").await?;
    let token = session.cookie.trim_start_matches("token=");

    let res = app.client.get(app.url("/api/auth/me")).bearer_auth(token).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn logout_clears_the_cookie() -> Result<()> {
    let app = TestApp::spawn().await?;
    let session = app.register("ada@example.com").await?;

    let res = app.request(Method::POST, "/api/auth/logout", &session).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let cleared = set_cookies(&res).into_iter().find(|c| c.starts_with("token="));
    assert!(cleared.is_some_and(|c| c.contains("Max-Age=0")));
    Ok(())
}

#[tokio::test]
async fn azure_oauth_links_the_account() -> Result<()> {
    let app = TestApp::spawn().await?;
    let session = app.register("ada@example.com").await?;

    // Start: redirect to the tenant's consent page with a state cookie
    let res = app.request(Method::GET, "/api/auth/azure", &session).send().await?;
    assert!(res.status().is_redirection());

    let location = res.headers()[LOCATION].to_str()?.to_string();
    assert!(location.starts_with(&format!("{}/login/tenant-1/oauth2/v2.0/authorize", app.azure.uri())));
    let consent = url::Url::parse(&location)?;
    let oauth_state = consent
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default();

    let state_cookie = set_cookies(&res)
        .into_iter()
        .find(|c| c.starts_with("azure_oauth_state="))
        .and_then(|c| c.split(';').next().map(str::to_string))
        .unwrap_or_default();
    assert_eq!(state_cookie, format!("azure_oauth_state={}", oauth_state));

    Mock::given(method("POST"))
        .and(path("/login/tenant-1/oauth2/v2.0/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=consent-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-arm-token",
            "refresh_token": "fresh-refresh",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&app.azure)
        .await;

    // Callback: no session cookie, only the state cookie
    let res = app
        .client
        .get(app.url("/api/auth/azure/callback"))
        .query(&[("code", "consent-code"), ("state", oauth_state.as_str())])
        .header("Cookie", &state_cookie)
        .send()
        .await?;
    assert!(res.status().is_redirection());
    assert_eq!(res.headers()[LOCATION], "http://dashboard.test/dashboard?linked=true");

    let user = app.state.store.find_user(session.user_id).await?.unwrap();
    assert!(user.is_dev_ops);
    assert_eq!(user.azure_access_token.as_deref(), Some("fresh-arm-token"));
    Ok(())
}

#[tokio::test]
async fn azure_callback_rejects_mismatched_state() -> Result<()> {
    let app = TestApp::spawn().await?;
    app.register("ada@example.com").await?;

    let res = app
        .client
        .get(app.url("/api/auth/azure/callback"))
        .query(&[("code", "consent-code"), ("state", "forged")])
        .header("Cookie", "azure_oauth_state=other")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn oauth_state_is_not_a_session() -> Result<()> {
    let app = TestApp::spawn().await?;
    let session = app.register("ada@example.com").await?;

    let res = app.request(Method::GET, "/api/auth/azure", &session).send().await?;
    let consent = url::Url::parse(res.headers()[LOCATION].to_str()?)?;
    let oauth_state = consent
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default();
    assert!(!oauth_state.is_empty());

    let res = app.client.get(app.url("/api/auth/me")).bearer_auth(&oauth_state).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = app
        .client
        .get(app.url("/api/auth/me"))
        .header("Cookie", format!("token={}", oauth_state))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn session_token_is_not_an_oauth_state() -> Result<()> {
    let app = TestApp::spawn().await?;
    let session = app.register("ada@example.com").await?;
    let token = session.cookie.trim_start_matches("token=");

    let res = app
        .client
        .get(app.url("/api/auth/azure/callback"))
        .query(&[("code", "consent-code"), ("state", token)])
        .header("Cookie", format!("azure_oauth_state={}", token))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}
