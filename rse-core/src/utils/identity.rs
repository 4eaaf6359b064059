//! Client identity resolution for publish and poll requests.

use rse_sdk::user_agent::{TEST_CLIENT_UUID, parse_client_uuid};

use crate::RseError;

pub const MISSING_UUID: &str = "Missing UUID in User-Agent header";

/// The client uuid carried in `user_agent`.
///
/// In test mode a User-Agent without one is accepted and identified as
/// [`TEST_CLIENT_UUID`].
pub fn resolve_client_uuid(user_agent: &str, test_mode: bool) -> Result<String, RseError> {
    match parse_client_uuid(user_agent) {
        Some(uuid) => Ok(uuid.to_string()),
        None if test_mode => {
            tracing::warn!("TEST MODE: bypassing User-Agent validation");
            Ok(TEST_CLIENT_UUID.to_string())
        }
        None => Err(RseError::Validation(MISSING_UUID)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UA: &str = "app/2.0 uuid/22222222-2222-2222-2222-222222222222";

    #[test]
    fn uuid_is_taken_from_the_user_agent() {
        assert_eq!(
            resolve_client_uuid(UA, false).unwrap(),
            "22222222-2222-2222-2222-222222222222"
        );
    }

    #[test]
    fn missing_uuid_depends_on_test_mode() {
        assert!(matches!(
            resolve_client_uuid("app/2.0", false),
            Err(RseError::Validation(MISSING_UUID))
        ));
        assert_eq!(resolve_client_uuid("", true).unwrap(), TEST_CLIENT_UUID);
    }
}
