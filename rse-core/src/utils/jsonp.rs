//! JSONP callback handling.

use crate::RseError;

pub const INVALID_CALLBACK: &str = "Invalid callback name";

/// Accept `name` only if it is a non-empty run of ASCII letters, digits and
/// underscores.
pub fn validate_callback(name: &str) -> Result<&str, RseError> {
    if !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        Ok(name)
    } else {
        Err(RseError::Validation(INVALID_CALLBACK))
    }
}

/// `callback(body);`
pub fn wrap(callback: &str, body: &str) -> String {
    format!("{callback}({body});")
}
