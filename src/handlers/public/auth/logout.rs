// handlers/public/auth/logout.rs - POST /api/auth/logout handler

use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde_json::Value;

use crate::auth::SESSION_COOKIE;
use crate::middleware::ApiResponse;

/// POST /api/auth/logout - Clear the session cookie (idempotent)
pub async fn logout_post(jar: CookieJar) -> (CookieJar, ApiResponse<Value>) {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, ApiResponse::success(Value::Null).with_message("Logged out"))
}
