use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use crate::auth::Registration;
use crate::handlers::TokenData;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// POST /auth/register - Register a new account and sign into it
///
/// Expected Input:
/// ```json
/// {
///   "name": "Ada",
///   "email": "ada@x.com",
///   "password": "secret1",
///   "password_confirmation": "secret1"
/// }
/// ```
///
/// Invalid input yields 422 with every failing field listed under `errors`.
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<Registration>, JsonRejection>,
) -> ApiResult<TokenData> {
    let Json(registration) = payload?;

    let token = state.auth.register(registration).await?;

    Ok(ApiResponse::success("login successfully", TokenData { token }))
}
