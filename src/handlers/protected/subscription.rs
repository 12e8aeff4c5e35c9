use axum::{extract::State, Extension};

use crate::database::models::Subscription;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::state::AppState;

/// GET /api/subscription - Subscriptions mirrored by the last Azure sync
pub async fn subscriptions_get(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Vec<Subscription>> {
    let subscriptions = state.store.list_subscriptions(auth_user.id).await?;
    if subscriptions.is_empty() {
        return Err(ApiError::not_found("No subscriptions found for this user."));
    }
    Ok(ApiResponse::success(subscriptions))
}
