// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Security Level: None. Login is throttled per identifier and client address;
// registration validates every field before touching the store.
// Route Prefix: /auth/*

pub mod auth;

pub use auth::*;
