// app.rs - Router assembly
//
// Route groups are built per area and merged; global layers come last.

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::config::SecurityConfig;
use crate::handlers::{protected, public};
use crate::middleware::jwt_auth_middleware;
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let body_limit = state.config.api.max_upload_bytes;
    let cors = cors_layer(&state.config.security);

    let protected_routes = Router::new()
        .merge(account_routes())
        .merge(app_routes())
        .merge(deploy_routes())
        .merge(monitor_routes())
        .merge(resource_group_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), jwt_auth_middleware));

    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(public_routes())
        // Session required
        .merge(protected_routes)
        // Global middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn public_routes() -> Router<AppState> {
    use public::auth;

    Router::new()
        .route("/api/auth/register", post(auth::register_post))
        .route("/api/auth/login", post(auth::login_post))
        .route("/api/auth/logout", post(auth::logout_post))
        .route("/api/auth/azure/callback", get(auth::azure_callback_get))
        // Webhooks authenticated by ?authKey=
        .route("/api/resourceGroup/budget-exceed", post(public::budget_exceed_post))
        .route("/api/monitor/check-budgets", get(public::check_budgets_get))
}

fn account_routes() -> Router<AppState> {
    use protected::{auth, subscription};

    Router::new()
        .route("/api/auth/me", get(auth::me_get))
        .route("/api/auth/azure", get(auth::oauth_start_get))
        .route("/api/auth/azure/check", get(auth::check_name_get))
        .route("/api/auth/azure/create-web-app", post(auth::create_web_app_post))
        .route("/api/auth/azure/sync", post(auth::sync_post))
        .route("/api/subscription", get(subscription::subscriptions_get))
}

fn app_routes() -> Router<AppState> {
    use protected::apps;

    Router::new()
        .route("/api/apps", get(apps::apps_get).post(apps::apps_post))
        .route("/api/apps/:appId", get(apps::app_get))
}

fn deploy_routes() -> Router<AppState> {
    use protected::deploy;

    Router::new()
        .route("/api/deploy/validate-zip", post(deploy::validate_zip_post))
        .route("/api/deploy/upload-and-deploy", post(deploy::upload_and_deploy_post))
        .route("/api/deploy/react-deploy", post(deploy::react_deploy_post))
}

fn monitor_routes() -> Router<AppState> {
    use protected::monitor;

    Router::new().route(
        "/api/monitor/:appId",
        get(monitor::monitor_get)
            .put(monitor::monitor_put)
            .post(monitor::monitor_post),
    )
}

fn resource_group_routes() -> Router<AppState> {
    use protected::resource_group as rg;

    Router::new()
        .route("/api/resourceGroup", get(rg::resource_groups_get).post(rg::resource_group_post))
        .route("/api/resourceGroup/check-name", get(rg::check_name_get))
        .route("/api/resourceGroup/budget/:group", get(rg::budget_get).put(rg::budget_put))
}

/// Credentialed CORS for the configured dashboard origins; permissive when none are set
fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Azora API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Azure App Service dashboard backend",
            "endpoints": {
                "auth": "/api/auth/{register,login,logout,me} (public + session)",
                "azure": "/api/auth/azure[/check|/create-web-app|/sync|/callback] (session)",
                "apps": "/api/apps[/:appId] (session)",
                "deploy": "/api/deploy/{validate-zip,upload-and-deploy,react-deploy} (session)",
                "monitor": "/api/monitor/:appId (session)",
                "resourceGroup": "/api/resourceGroup[/check-name|/budget/:group] (session)",
                "subscription": "/api/subscription (session)",
                "webhooks": "/api/resourceGroup/budget-exceed, /api/monitor/check-budgets (authKey)",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "timestamp": now, "database": "ok" })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "degraded",
                "timestamp": now,
                "database_error": e.to_string(),
            })),
        ),
    }
}
