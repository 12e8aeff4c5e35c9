mod common;

use anyhow::Result;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use common::{site_path, Session, TestApp, SUBSCRIPTION};

async fn deployed_app(app: &TestApp) -> Result<(Session, Uuid)> {
    let (session, app_id) = app.user_with_app("ada@example.com", "shop", 100.0).await?;
    app.mark_deployed(app_id, "shop-site").await?;
    Ok((session, app_id))
}

#[tokio::test]
async fn monitor_reports_month_to_date_cost() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (session, app_id) = deployed_app(&app).await?;

    Mock::given(method("POST"))
        .and(path(format!("/subscriptions/{}/providers/Microsoft.CostManagement/query", SUBSCRIPTION)))
        .and(query_param("api-version", "2023-03-01"))
        .and(body_partial_json(json!({ "type": "ActualCost", "timeframe": "MonthToDate" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "properties": { "rows": [[7.25, "USD"]] }
        })))
        .mount(&app.azure)
        .await;

    let res = app
        .request(Method::GET, &format!("/api/monitor/{}", app_id), &session)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["cost"], 7.25);
    assert_eq!(body["budget"], 100.0);
    assert_eq!(body["autoShutdown"], false);
    assert_eq!(body["appName"], "shop-site");

    let stored = app.state.store.find_app(app_id).await?.unwrap();
    assert_eq!(stored.current_cost, 7.25);
    Ok(())
}

#[tokio::test]
async fn monitor_on_draft_app_is_bad_request() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (session, app_id) = app.user_with_app("ada@example.com", "shop", 100.0).await?;

    let res = app
        .request(Method::GET, &format!("/api/monitor/{}", app_id), &session)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["message"], "App has not been deployed to Azure yet");
    Ok(())
}

#[tokio::test]
async fn settings_update_pushes_merged_env_to_azure() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (session, app_id) = deployed_app(&app).await?;

    Mock::given(method("PUT"))
        .and(path(format!("{}/config/appsettings", site_path("shop-site"))))
        .and(body_partial_json(json!({ "properties": { "NODE_ENV": "production" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(2)
        .mount(&app.azure)
        .await;

    let res = app
        .request(Method::PUT, &format!("/api/monitor/{}", app_id), &session)
        .json(&json!({ "budget": 40, "autoShut": true, "env": { "NODE_ENV": "production" } }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["message"], "Settings updated successfully");

    // Second update adds a key; the first one is still sent
    let res = app
        .request(Method::PUT, &format!("/api/monitor/{}", app_id), &session)
        .json(&json!({ "env": { "API_URL": "https://api.test" } }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let stored = app.state.store.find_app(app_id).await?.unwrap();
    assert_eq!(stored.budget, 40.0);
    assert!(stored.auto_stop);
    assert_eq!(stored.env_vars.0.len(), 2);
    Ok(())
}

#[tokio::test]
async fn budget_only_update_stays_local() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (session, app_id) = app.user_with_app("ada@example.com", "shop", 100.0).await?;

    let res = app
        .request(Method::PUT, &format!("/api/monitor/{}", app_id), &session)
        .json(&json!({ "budget": -1, "autoShut": false }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let stored = app.state.store.find_app(app_id).await?.unwrap();
    assert_eq!(stored.budget, -1.0);

    let res = app
        .request(Method::PUT, &format!("/api/monitor/{}", app_id), &session)
        .json(&json!({ "budget": 0 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn restart_starts_a_stopped_site() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (session, app_id) = deployed_app(&app).await?;

    Mock::given(method("GET"))
        .and(path(site_path("shop-site")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "properties": { "state": "Stopped" } })))
        .mount(&app.azure)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/start", site_path("shop-site"))))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.azure)
        .await;

    let res = app
        .request(Method::POST, &format!("/api/monitor/{}", app_id), &session)
        .json(&json!({ "action": "restart" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["message"], "App started successfully");
    Ok(())
}

#[tokio::test]
async fn restart_in_unknown_state_is_an_error() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (session, app_id) = deployed_app(&app).await?;

    Mock::given(method("GET"))
        .and(path(site_path("shop-site")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "properties": { "state": "Starting" } })))
        .mount(&app.azure)
        .await;

    let res = app
        .request(Method::POST, &format!("/api/monitor/{}", app_id), &session)
        .json(&json!({ "action": "restart" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = res.json().await?;
    assert_eq!(body["message"], "Unhandled app state: Starting");
    Ok(())
}

#[tokio::test]
async fn delete_removes_site_and_record() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (session, app_id) = deployed_app(&app).await?;

    Mock::given(method("DELETE"))
        .and(path(site_path("shop-site")))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.azure)
        .await;

    let res = app
        .request(Method::POST, &format!("/api/monitor/{}", app_id), &session)
        .json(&json!({ "action": "delete" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(app.state.store.find_app(app_id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn unknown_action_is_rejected() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (session, app_id) = deployed_app(&app).await?;

    let res = app
        .request(Method::POST, &format!("/api/monitor/{}", app_id), &session)
        .json(&json!({ "action": "scale" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["message"], "Invalid action");
    Ok(())
}

#[tokio::test]
async fn rate_limited_calls_are_retried() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (session, app_id) = deployed_app(&app).await?;

    Mock::given(method("POST"))
        .and(path(format!("{}/stop", site_path("shop-site"))))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&app.azure)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/stop", site_path("shop-site"))))
        .respond_with(ResponseTemplate::new(200))
        .mount(&app.azure)
        .await;

    let res = app
        .request(Method::POST, &format!("/api/monitor/{}", app_id), &session)
        .json(&json!({ "action": "stop" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["message"], "Action 'stop' completed.");
    Ok(())
}
