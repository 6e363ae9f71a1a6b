//! Authentication: token signing, the single-use ledger, session cookies,
//! the auth middleware and the HTTP flows built on top of them.

pub mod cookies;
pub mod handlers;
pub mod jwt;
pub mod ledger;
pub mod middleware;
pub mod oauth;
pub mod password;

#[cfg(test)]
mod edge_case_tests;

pub use jwt::TokenSigner;
pub use ledger::{Purpose, TokenLedger};
pub use middleware::{require_auth, AuthUser};
