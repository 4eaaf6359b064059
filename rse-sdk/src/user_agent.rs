//! Client identity carried in the `User-Agent` header.
//!
//! Every client embeds `uuid/<36-char uuid>` somewhere in its User-Agent.
//! The server stores that value with each published event and uses it to
//! keep a client from receiving its own events back.

use uuid::Uuid;

/// Marker that precedes the client uuid inside a User-Agent string.
pub const UUID_MARKER: &str = "uuid/";

/// Length of the textual uuid following [`UUID_MARKER`].
pub const UUID_LEN: usize = 36;

/// Client uuid substituted in test mode when a User-Agent carries none.
pub const TEST_CLIENT_UUID: &str = "550e8400-dead-beef-dead-446655440000";

/// Whether `user_agent` can be embedded verbatim in a JSON string.
pub fn is_safe_user_agent(user_agent: &str) -> bool {
    !user_agent.contains(['"', '\\'])
}

/// Extract the 36 characters following the first `uuid/` marker.
///
/// Returns `None` when the marker is missing or fewer than 36 bytes
/// follow it. The value is not validated as a uuid.
pub fn parse_client_uuid(user_agent: &str) -> Option<&str> {
    let start = user_agent.find(UUID_MARKER)? + UUID_MARKER.len();
    user_agent.get(start..start + UUID_LEN)
}

/// Build a User-Agent string identifying `product` as client `uuid`.
pub fn user_agent_for(product: &str, uuid: Uuid) -> String {
    format!("{product} {UUID_MARKER}{uuid}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_embedded_uuid() {
        let ua = "agent/1.2 (linux) uuid/11111111-1111-1111-1111-111111111111 extra";
        assert_eq!(
            parse_client_uuid(ua),
            Some("11111111-1111-1111-1111-111111111111")
        );
    }

    #[test]
    fn missing_or_short_uuid_is_rejected() {
        assert_eq!(parse_client_uuid("agent/1.2"), None);
        assert_eq!(parse_client_uuid("agent/1.2 uuid/1234"), None);
    }

    #[test]
    fn unsafe_characters_are_detected() {
        assert!(is_safe_user_agent("agent/1.0 uuid/x"));
        assert!(!is_safe_user_agent("agent \"quoted\""));
        assert!(!is_safe_user_agent("agent\\1.0"));
    }

    #[test]
    fn built_user_agent_round_trips() {
        let id = Uuid::new_v4();
        let ua = user_agent_for("rse-sdk/0.1", id);
        assert_eq!(parse_client_uuid(&ua), Some(id.to_string().as_str()));
    }
}
