use axum::extract::{Extension, State};
use serde::Serialize;
use serde_json::{json, Value};

use crate::database::models::User;
use crate::handlers::TokenData;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::BearerToken;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UserData {
    pub user: User,
}

/// GET /api/auth/whoami - The user behind the presented token
///
/// Expected Output:
/// ```json
/// {
///   "success": true,
///   "message": "success",
///   "data": {
///     "user": { "id": "...", "name": "Ada", "email": "ada@x.com", "created_at": "...", "updated_at": "..." }
///   }
/// }
/// ```
pub async fn whoami(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
) -> ApiResult<UserData> {
    let user = state.auth.whoami(&token).await?;
    Ok(ApiResponse::success("success", UserData { user }))
}

/// POST /api/auth/refresh - Exchange the presented token for a new one
///
/// The token may already be expired as long as it is inside the refresh
/// grace window. The presented token stops working.
pub async fn refresh(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
) -> ApiResult<TokenData> {
    let token = state.auth.refresh(&token).await?;
    Ok(ApiResponse::success("refresh successfully", TokenData { token }))
}

/// POST /api/auth/logout - Revoke the presented token
pub async fn logout(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
) -> ApiResult<Value> {
    state.auth.logout(&token).await?;
    Ok(ApiResponse::success("logout successfully", json!({})))
}
