//! Handler-facing services.

pub mod auth;
pub mod cookies;
