// handlers/protected/auth/mod.rs - Session-scoped account endpoints

pub mod azure;
pub mod session;

pub use azure::{check_name_get, create_web_app_post, oauth_start_get, sync_post};
pub use session::me_get;
