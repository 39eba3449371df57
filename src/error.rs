/*!
 * Error types for the order client
 */

use std::time::Duration;
use thiserror::Error;

use crate::timestamp::TimestampError;

pub type Result<T> = std::result::Result<T, OrderClientError>;

#[derive(Error, Debug)]
pub enum OrderClientError {
    /// Total connection budget ran out (or the connect was cancelled)
    #[error("failed to connect to order service after multiple retries (total timeout reached): {0}")]
    ConnectTimeout(#[source] DeadlineError),

    /// Every dial attempt failed within the time budget
    #[error("failed to connect to order service after {attempts} retries: {source}")]
    ConnectExhausted {
        attempts: u32,
        #[source]
        source: DialError,
    },

    /// Address cannot be turned into a gRPC endpoint
    #[error("invalid order service address {address:?}: {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: tonic::transport::Error,
    },

    /// Remote call failed; the status is passed through untouched
    #[error(transparent)]
    Rpc(#[from] tonic::Status),

    #[error("order service response did not contain an order")]
    MissingOrder,

    #[error("invalid order timestamp: {0}")]
    Timestamp(#[from] TimestampError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl OrderClientError {
    /// Whether this error came out of connection establishment
    pub fn is_connect_error(&self) -> bool {
        matches!(
            self,
            OrderClientError::ConnectTimeout(_)
                | OrderClientError::ConnectExhausted { .. }
                | OrderClientError::InvalidAddress { .. }
        )
    }

    /// The remote status, when the failure came from the service itself
    pub fn status(&self) -> Option<&tonic::Status> {
        match self {
            OrderClientError::Rpc(status) => Some(status),
            _ => None,
        }
    }
}

/// Why a single dial attempt failed
#[derive(Error, Debug)]
pub enum DialError {
    #[error("dial timed out after {0:?}")]
    TimedOut(Duration),

    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// Not retryable; the address will never resolve to an endpoint
    #[error("invalid address: {0}")]
    InvalidAddress(#[source] tonic::transport::Error),

    /// The policy allowed no attempts at all
    #[error("no dial attempts allowed")]
    NotAttempted,
}

/// Why the connect deadline fired
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineError {
    /// Not enough of `budget` is left for another attempt. `elapsed` is
    /// the real time spent, which can be short of `budget`.
    #[error("connect budget of {budget:?} would be exceeded (elapsed {elapsed:?})")]
    Elapsed { elapsed: Duration, budget: Duration },

    #[error("connect cancelled")]
    Cancelled,
}
