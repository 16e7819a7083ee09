// handlers/mod.rs - Two-tier handler layout
//
// Public (no token) → Protected (bearer token required)
pub mod public;    // /auth/*: token acquisition
pub mod protected; // /api/auth/*: operations on the caller's session

use serde::Serialize;

use crate::auth::IssuedToken;

/// `data` payload of every response that hands out a token
#[derive(Debug, Serialize)]
pub struct TokenData {
    pub token: IssuedToken,
}
