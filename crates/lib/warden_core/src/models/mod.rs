//! Domain models shared across the warden crates.

pub mod auth;
pub mod csrf;
pub mod permission;
