//! # warden_core
//!
//! Session tokens, CSRF tokens and permission rules for the Warden request
//! authorization layer. Transport-agnostic: the HTTP pipeline lives in
//! `warden_api`.

pub mod auth;
pub mod csrf;
pub mod migrate;
pub mod models;
pub mod permissions;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
