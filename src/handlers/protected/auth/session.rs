use axum::{extract::State, Extension};

use crate::database::models::User;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::state::AppState;

/// GET /api/auth/me - Current user, without password hash or Azure tokens
///
/// Expected Output:
/// ```json
/// {
///   "success": true,
///   "data": {
///     "id": "uuid",
///     "email": "user@example.com",
///     "name": "Ada",
///     "isDevOps": true,
///     "azureExpiresAt": "2026-01-01T00:00:00Z"
///   }
/// }
/// ```
pub async fn me_get(State(state): State<AppState>, Extension(auth_user): Extension<AuthUser>) -> ApiResult<User> {
    let user = state
        .store
        .find_user(auth_user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(ApiResponse::success(user))
}
