use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use crate::database::models::Credentials;
use crate::middleware::{ApiResponse, ApiResult, ClientAddr};
use crate::services::LoginOutcome;
use crate::state::AppState;

/// POST /auth/login - Authenticate user and receive a bearer token
///
/// Expected Input:
/// ```json
/// { "email": "ada@x.com", "password": "secret1" }
/// ```
/// `username` is accepted in place of `email`.
///
/// Expected Output (Success):
/// ```json
/// {
///   "success": true,
///   "message": "login successfully",
///   "data": {
///     "user": { "id": "...", "name": "Ada", "email": "ada@x.com", ... },
///     "token": { "token": "eyJhbGciOiJIUzI1NiI...", "token_type": "bearer", "expires_in": 3600 }
///   }
/// }
/// ```
///
/// Failures: 401 for bad credentials (same message whether or not the user
/// exists), 429 with `Retry-After` while the identifier/address pair is
/// locked out.
pub async fn login(
    State(state): State<AppState>,
    ClientAddr(client): ClientAddr,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<LoginOutcome> {
    let Json(credentials) = payload?;

    let outcome = state.auth.login(credentials, client).await?;

    Ok(ApiResponse::success("login successfully", outcome))
}
