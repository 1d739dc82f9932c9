//! Cookie service: build and clear the session and CSRF cookies.

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

use crate::config::ApiConfig;

/// Cookie carrying the signed session token.
pub const SESSION_COOKIE: &str = "SESSION";
/// Cookie carrying the CSRF code.
pub const CSRF_COOKIE: &str = "CSRF_TOKEN";

/// httpOnly, SameSite=None, path `/`, with the configured secure flag and domain.
fn base_cookie(config: &ApiConfig, name: &'static str, value: String) -> Cookie<'static> {
    let mut cookie = Cookie::build((name, value))
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::None)
        .path("/")
        .build();
    if let Some(domain) = &config.cookie_domain {
        cookie.set_domain(domain.clone());
    }
    cookie
}

/// Session cookie living as long as the token.
pub fn session_cookie(config: &ApiConfig, token: &str) -> Cookie<'static> {
    let mut cookie = base_cookie(config, SESSION_COOKIE, token.to_string());
    cookie.set_max_age(Duration::seconds(config.session_ttl.num_seconds()));
    cookie
}

/// CSRF cookie living as long as the stored CSRF token.
pub fn csrf_cookie(config: &ApiConfig, code: &str) -> Cookie<'static> {
    let mut cookie = base_cookie(config, CSRF_COOKIE, code.to_string());
    cookie.set_max_age(Duration::seconds(config.csrf_ttl.num_seconds()));
    cookie
}

/// Expired cookie that clears `name` on the client.
pub fn clear_cookie(config: &ApiConfig, name: &'static str) -> Cookie<'static> {
    let mut cookie = base_cookie(config, name, String::new());
    cookie.set_max_age(Duration::ZERO);
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_attributes() {
        let config = ApiConfig {
            cookie_domain: Some("example.com".into()),
            ..ApiConfig::default()
        };
        let cookie = session_cookie(&config, "tok");
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "tok");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::None));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.domain(), Some("example.com"));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(7200)));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let cookie = clear_cookie(&ApiConfig::default(), CSRF_COOKIE);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
        assert_eq!(cookie.domain(), None);
    }
}
