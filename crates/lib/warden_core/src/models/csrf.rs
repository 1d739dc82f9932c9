//! CSRF token models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted CSRF token row. Only the SHA-256 hash of the code is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsrfToken {
    pub code_hash: String,
    pub owner_email: String,
    pub expiration_date: DateTime<Utc>,
}

/// A freshly issued CSRF token together with its plaintext code.
///
/// The plaintext only exists here; it goes to the client cookie and is
/// never read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCsrfToken {
    pub code: String,
    pub token: CsrfToken,
}
