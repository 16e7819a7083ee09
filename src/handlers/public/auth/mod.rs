// handlers/public/auth/mod.rs - Token acquisition endpoints

pub mod login;    // POST /auth/login - authenticate and get a token
pub mod register; // POST /auth/register - create an account and get a token

pub use login::login;
pub use register::register;
