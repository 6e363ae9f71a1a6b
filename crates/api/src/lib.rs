// API crate clippy configuration
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Kampus API server
//!
//! Account lifecycle for the Kampus platform: registration with email
//! verification, session login, Google OAuth, password reset, profile
//! reads through a cache, gated account deletion and OTP-confirmed phone
//! updates.

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod kv;
pub mod ratelimit;
pub mod routes;
pub mod state;
pub mod users;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use routes::build_router;
pub use state::AppState;
