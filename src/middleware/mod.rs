pub mod auth;
pub mod client;
pub mod response;

pub use auth::bearer_auth_middleware;
pub use client::ClientAddr;
pub use response::{ApiResponse, ApiResult};
