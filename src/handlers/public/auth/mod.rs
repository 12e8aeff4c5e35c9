// handlers/public/auth/mod.rs - Public authentication handlers
//
// Register, login and logout. Successful calls set the `token` session cookie.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

use crate::auth::{generate_jwt, Claims, SESSION_COOKIE};
use crate::config::SecurityConfig;
use crate::database::models::User;
use crate::error::ApiError;

pub mod azure_callback; // GET /api/auth/azure/callback
pub mod login;          // POST /api/auth/login
pub mod logout;         // POST /api/auth/logout
pub mod register;       // POST /api/auth/register

pub use azure_callback::azure_callback_get;
pub use login::login_post;
pub use logout::logout_post;
pub use register::register_post;

/// Issue a session JWT for `user` and add it to the jar
pub(crate) fn start_session(jar: CookieJar, user: &User, security: &SecurityConfig) -> Result<CookieJar, ApiError> {
    let claims = Claims::new(user.id, user.email.clone(), security.jwt_expiry_hours);
    let token = generate_jwt(&claims, security)?;
    Ok(jar.add(session_cookie(token, security)))
}

fn session_cookie(token: String, security: &SecurityConfig) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .secure(security.secure_cookies)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(Duration::hours(security.jwt_expiry_hours as i64))
        .build()
}

/// Loose `local@domain.tld` shape check
pub(crate) fn validate_credentials(email: &str, password: &str) -> Result<(), ApiError> {
    let well_formed = email
        .split_once('@')
        .is_some_and(|(local, domain)| {
            !local.is_empty()
                && !email.contains(char::is_whitespace)
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
        });
    if !well_formed {
        return Err(ApiError::invalid_field("email", "Invalid email address"));
    }
    if password.chars().count() < 6 {
        return Err(ApiError::invalid_field("password", "Password must be at least 6 characters"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn credential_rules() {
        assert!(validate_credentials("dev@example.com", "secret").is_ok());
        assert!(validate_credentials("dev@localhost", "secret").is_err());
        assert!(validate_credentials("@example.com", "secret").is_err());
        assert!(validate_credentials("dev @example.com", "secret").is_err());
        assert!(validate_credentials("dev@example.com", "12345").is_err());
    }

    #[test]
    fn cookie_attributes() {
        let security = AppConfig::development().security;
        let cookie = session_cookie("abc".into(), &security);
        assert_eq!(cookie.name(), "token");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(Duration::days(7)));
    }
}
