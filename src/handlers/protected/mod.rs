// handlers/protected/mod.rs - Handlers behind the bearer-token middleware
//
// Route Prefix: /api/*
// Middleware: bearer_auth_middleware puts a BearerToken in request extensions

pub mod auth;

pub use auth::*;
