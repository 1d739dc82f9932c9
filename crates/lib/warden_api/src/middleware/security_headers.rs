//! Response headers sent on every response, denied ones included.

use axum::http::HeaderValue;
use axum::http::header::{CONTENT_SECURITY_POLICY, REFERRER_POLICY};
use axum::response::Response;

pub const CONTENT_SECURITY_POLICY_VALUE: &str = "default-src 'self'; script-src 'self'; \
    object-src 'none'; style-src 'self' 'unsafe-inline'; base-uri 'self'; \
    frame-ancestors 'none'; form-action 'self'; img-src 'self' data:;";

pub const REFERRER_POLICY_VALUE: &str = "no-referrer";

/// Axum `map_response` middleware setting CSP and Referrer-Policy.
pub async fn security_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(CONTENT_SECURITY_POLICY_VALUE),
    );
    headers.insert(REFERRER_POLICY, HeaderValue::from_static(REFERRER_POLICY_VALUE));
    response
}
