/*!
 * order-client: client for the Order gRPC service
 *
 * Two layers:
 *
 * - **Connector**: dials the service with a bounded retry loop
 *   (attempt count plus overall deadline) and hands back a channel.
 * - **OrderClient**: submits orders and lists an account's orders,
 *   translating between wire messages and [`Order`] / [`OrderedProduct`].
 *
 * ```rust,no_run
 * use order_client::{CallContext, ClientConfig, OrderClient};
 * use std::time::Duration;
 *
 * # async fn example() -> anyhow::Result<()> {
 * let config = ClientConfig::new("orders.internal:50051");
 * order_client::logging::init_logging(&config)?;
 *
 * let client = OrderClient::from_config(&config).await?;
 * let ctx = CallContext::new().with_timeout(Duration::from_secs(3));
 * for order in client.list_orders_for_account(&ctx, "account-1").await? {
 *     println!("{} {} {:.2}", order.id, order.created_at, order.total_price);
 * }
 * # Ok(())
 * # }
 * ```
 */

pub mod client;
pub mod config;
pub mod connector;
pub mod error;
pub mod logging;
pub mod models;
pub mod timestamp;

pub use client::{CallContext, OrderClient, OrderStub};
pub use config::{ClientConfig, LogLevel, RetryPolicy};
pub use connector::{Connector, Dialer, NextAction, TonicDialer};
pub use error::{DeadlineError, DialError, OrderClientError, Result};
pub use models::{Order, OrderedProduct, ProductDetails};
pub use timestamp::{TimestampError, TimestampPolicy};
