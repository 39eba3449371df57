/*!
 * Connection establishment with bounded retry
 *
 * The connector dials the order service until it gets a channel, the retry
 * count runs out, or the total time budget is spent. Every step is decided
 * by [`RetryPolicy::next_action`], which only looks at how many attempts
 * have been made and how much time has passed; the loop in
 * [`Connector::connect_with_cancel`] carries those decisions out.
 */

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, info, warn};

use crate::config::RetryPolicy;
use crate::error::{DeadlineError, DialError, OrderClientError, Result};

/// What the connect loop should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    /// Make a dial attempt now
    Dial,
    /// Sleep, then dial again
    Wait(Duration),
    /// The deadline fires before another attempt could start
    TimeoutExceeded,
    /// All attempts used up
    Exhausted,
}

impl RetryPolicy {
    /// Decide the next step after `attempts` failed dials, `elapsed` into
    /// the connect operation.
    ///
    /// A wait that would reach the deadline counts as a timeout, even after
    /// the final attempt; the retry count only decides the outcome when the
    /// budget still has room for a full interval.
    pub fn next_action(&self, attempts: u32, elapsed: Duration) -> NextAction {
        if attempts == 0 {
            return if self.max_retries == 0 {
                NextAction::Exhausted
            } else {
                NextAction::Dial
            };
        }

        let remaining = self.total_timeout().saturating_sub(elapsed);
        if remaining <= self.retry_interval() {
            return NextAction::TimeoutExceeded;
        }
        if attempts >= self.max_retries {
            return NextAction::Exhausted;
        }

        NextAction::Wait(self.retry_interval())
    }
}

/// Something that can open a connection to an address
#[async_trait]
pub trait Dialer: Send + Sync {
    type Connection: Send;

    /// One dial attempt. `timeout` is the per-attempt bound; the connector
    /// enforces it as well, so implementations may ignore it.
    async fn dial(&self, address: &str, timeout: Duration) -> std::result::Result<Self::Connection, DialError>;
}

/// Dials a plaintext gRPC channel with tonic
#[derive(Debug, Clone, Copy, Default)]
pub struct TonicDialer;

/// Turn `host:port` into an `http://` endpoint; full URIs pass through
pub fn endpoint_for(address: &str) -> std::result::Result<Endpoint, tonic::transport::Error> {
    if address.contains("://") {
        Endpoint::from_shared(address.to_string())
    } else {
        Endpoint::from_shared(format!("http://{}", address))
    }
}

#[async_trait]
impl Dialer for TonicDialer {
    type Connection = Channel;

    async fn dial(&self, address: &str, timeout: Duration) -> std::result::Result<Channel, DialError> {
        let endpoint = endpoint_for(address)
            .map_err(DialError::InvalidAddress)?
            .connect_timeout(timeout);

        Ok(endpoint.connect().await?)
    }
}

/// Establishes connections according to a [`RetryPolicy`]
#[derive(Debug, Clone)]
pub struct Connector<D = TonicDialer> {
    dialer: D,
    policy: RetryPolicy,
}

impl Connector<TonicDialer> {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_dialer(TonicDialer, policy)
    }
}

impl Default for Connector<TonicDialer> {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl<D: Dialer> Connector<D> {
    pub fn with_dialer(dialer: D, policy: RetryPolicy) -> Self {
        Self { dialer, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn dialer(&self) -> &D {
        &self.dialer
    }

    /// Connect to `address`, retrying per policy
    pub async fn connect(&self, address: &str) -> Result<D::Connection> {
        self.connect_with_cancel(address, &CancellationToken::new()).await
    }

    /// Connect to `address`, giving up early if `cancel` fires.
    ///
    /// # Errors
    ///
    /// - `ConnectTimeout` when the total budget runs out or `cancel` fires
    /// - `ConnectExhausted` when every attempt failed inside the budget
    /// - `InvalidAddress` when `address` can never be dialed
    pub async fn connect_with_cancel(&self, address: &str, cancel: &CancellationToken) -> Result<D::Connection> {
        let policy = self.policy;
        let interval = policy.retry_interval();
        let started = Instant::now();
        let deadline = started + policy.total_timeout();

        let mut attempts = 0;
        let mut last_error = None;

        loop {
            match policy.next_action(attempts, started.elapsed()) {
                NextAction::Dial => {}
                NextAction::Wait(delay) => {
                    debug!(address, attempt = attempts, "Retrying in {:?}", delay);
                    tokio::select! {
                        _ = time::sleep(delay) => {}
                        _ = time::sleep_until(deadline) => {
                            return Err(OrderClientError::ConnectTimeout(DeadlineError::Elapsed {
                                elapsed: started.elapsed(),
                                budget: policy.total_timeout(),
                            }));
                        }
                        _ = cancel.cancelled() => {
                            return Err(OrderClientError::ConnectTimeout(DeadlineError::Cancelled));
                        }
                    }
                }
                NextAction::TimeoutExceeded => {
                    let elapsed = started.elapsed();
                    warn!(
                        address,
                        attempts,
                        ?elapsed,
                        "Connect budget of {:?} leaves no room for another attempt",
                        policy.total_timeout()
                    );
                    return Err(OrderClientError::ConnectTimeout(DeadlineError::Elapsed {
                        elapsed,
                        budget: policy.total_timeout(),
                    }));
                }
                NextAction::Exhausted => {
                    return Err(OrderClientError::ConnectExhausted {
                        attempts,
                        source: last_error.unwrap_or(DialError::NotAttempted),
                    });
                }
            }

            attempts += 1;
            info!(
                address,
                attempt = attempts,
                max_retries = policy.max_retries,
                "Attempting to connect to order service"
            );

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(OrderClientError::ConnectTimeout(DeadlineError::Cancelled));
                }
                res = time::timeout(interval, self.dialer.dial(address, interval)) => res,
            };

            match outcome {
                Ok(Ok(conn)) => {
                    info!(address, attempt = attempts, "Connected to order service");
                    return Ok(conn);
                }
                Ok(Err(DialError::InvalidAddress(source))) => {
                    return Err(OrderClientError::InvalidAddress {
                        address: address.to_string(),
                        source,
                    });
                }
                Ok(Err(e)) => {
                    warn!(address, attempt = attempts, error = %e, "Failed to connect to order service");
                    last_error = Some(e);
                }
                Err(_) => {
                    warn!(address, attempt = attempts, "Dial timed out after {:?}", interval);
                    last_error = Some(DialError::TimedOut(interval));
                }
            }
        }
    }
}
