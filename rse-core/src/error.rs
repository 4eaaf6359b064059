//! Error taxonomy shared by the publisher, the poller and the auth gate.
//!
//! Backend adapters have their own error types ([`StoreError`],
//! [`CacheError`]); those are classified into [`RseError`] once local
//! retries are exhausted. Messages on `Validation` are public and stable;
//! the `String` payloads on `Unavailable` and `Internal` are for logs only.
//!
//! [`StoreError`]: crate::store::StoreError
//! [`CacheError`]: crate::auth::CacheError

use thiserror::Error;

use crate::allocator::AllocationError;
use crate::retry::RetryError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum RseError {
    /// Malformed payload, callback name, client uuid or parameter.
    #[error("{0}")]
    Validation(&'static str),

    /// Missing or unrecognized auth token.
    #[error("unauthorized")]
    Unauthorized,

    /// A backend stayed unreachable for the whole local retry budget.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Id allocation kept colliding with concurrent publishers.
    #[error("event id allocation exhausted after {attempts} attempts")]
    AllocationExhausted { attempts: u32 },

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for RseError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => RseError::Unavailable(msg),
            StoreError::Duplicate(id) => RseError::Internal(format!("duplicate event id {id}")),
            StoreError::Backend(msg) => RseError::Internal(msg),
        }
    }
}

impl From<RetryError<StoreError>> for RseError {
    fn from(err: RetryError<StoreError>) -> Self {
        match err {
            RetryError::Exhausted { attempts, last } => {
                tracing::error!(attempts, error = %last, "store retry budget exhausted");
                RseError::from(last)
            }
            RetryError::Aborted(err) => RseError::from(err),
        }
    }
}

impl From<AllocationError> for RseError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::Exhausted { attempts } => RseError::AllocationExhausted { attempts },
            AllocationError::Store(err) => RseError::from(err),
        }
    }
}

impl From<RetryError<AllocationError>> for RseError {
    fn from(err: RetryError<AllocationError>) -> Self {
        match err {
            RetryError::Exhausted { attempts, last } => {
                tracing::error!(attempts, error = %last, "store stayed unavailable while publishing");
                RseError::from(last)
            }
            RetryError::Aborted(err) => RseError::from(err),
        }
    }
}
