use rse_sdk::user_agent::is_safe_user_agent;
use serde::de::IgnoredAny;

use crate::RseError;
use crate::allocator::{AllocationError, IdAllocator, PendingEvent};
use crate::channel::validate_channel;
use crate::retry::RetryPolicy;
use crate::utils::identity::resolve_client_uuid;

pub const INVALID_JSON: &str = "Invalid JSON";

/// A publish as received from a client.
#[derive(Debug, Clone, Copy)]
pub struct PublishRequest<'a> {
    pub channel: &'a str,
    /// Raw JSON payload, stored verbatim.
    pub data: &'a str,
    /// `None` is treated like an empty header.
    pub user_agent: Option<&'a str>,
}

pub struct EventPublisher {
    allocator: IdAllocator,
    connectivity: RetryPolicy,
    test_mode: bool,
}

impl EventPublisher {
    pub fn new(allocator: IdAllocator, connectivity: RetryPolicy, test_mode: bool) -> Self {
        Self {
            allocator,
            connectivity,
            test_mode,
        }
    }

    /// Validate and store one event, returning its id.
    pub async fn publish(&self, request: PublishRequest<'_>) -> Result<i64, RseError> {
        let pending = self.validate(request)?;

        let id = self
            .connectivity
            .run(AllocationError::is_unavailable, |_| {
                self.allocator.allocate(&pending)
            })
            .await?;

        tracing::debug!(id, channel = %pending.channel, "event published");
        Ok(id)
    }

    fn validate(&self, request: PublishRequest<'_>) -> Result<PendingEvent, RseError> {
        validate_channel(request.channel)?;
        if serde_json::from_str::<IgnoredAny>(request.data).is_err() {
            return Err(RseError::Validation(INVALID_JSON));
        }
        let user_agent = request.user_agent.unwrap_or_default();
        if !is_safe_user_agent(user_agent) {
            return Err(RseError::Validation(INVALID_JSON));
        }
        let uuid = resolve_client_uuid(user_agent, self.test_mode)?;

        Ok(PendingEvent {
            channel: request.channel.to_string(),
            data: request.data.to_string(),
            user_agent: user_agent.to_string(),
            uuid,
        })
    }
}
