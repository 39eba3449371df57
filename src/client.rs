//! OrderClient: domain-level facade over the Order service stub

use async_trait::async_trait;
use order_proto::{
    order_service_client::OrderServiceClient, GetOrdersForAccountRequest,
    GetOrdersForAccountResponse, PostOrderRequest, PostOrderResponse,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tonic::transport::Channel;
use tonic::{Request, Response, Status};
use tracing::{debug, error, info, instrument};

use crate::config::ClientConfig;
use crate::connector::Connector;
use crate::error::{OrderClientError, Result};
use crate::models::{Order, OrderedProduct};
use crate::timestamp::TimestampPolicy;

/// The remote operations the facade needs.
///
/// Implemented for the generated tonic client; tests plug in their own.
#[async_trait]
pub trait OrderStub: Send + Sync {
    async fn post_order(&self, request: Request<PostOrderRequest>) -> std::result::Result<Response<PostOrderResponse>, Status>;

    async fn get_orders_for_account(
        &self,
        request: Request<GetOrdersForAccountRequest>,
    ) -> std::result::Result<Response<GetOrdersForAccountResponse>, Status>;
}

#[async_trait]
impl OrderStub for OrderServiceClient<Channel> {
    async fn post_order(&self, request: Request<PostOrderRequest>) -> std::result::Result<Response<PostOrderResponse>, Status> {
        // Cloning shares the underlying channel
        OrderServiceClient::post_order(&mut self.clone(), request).await
    }

    async fn get_orders_for_account(
        &self,
        request: Request<GetOrdersForAccountRequest>,
    ) -> std::result::Result<Response<GetOrdersForAccountResponse>, Status> {
        OrderServiceClient::get_orders_for_account(&mut self.clone(), request).await
    }
}

#[async_trait]
impl<T: OrderStub + ?Sized> OrderStub for Arc<T> {
    async fn post_order(&self, request: Request<PostOrderRequest>) -> std::result::Result<Response<PostOrderResponse>, Status> {
        (**self).post_order(request).await
    }

    async fn get_orders_for_account(
        &self,
        request: Request<GetOrdersForAccountRequest>,
    ) -> std::result::Result<Response<GetOrdersForAccountResponse>, Status> {
        (**self).get_orders_for_account(request).await
    }
}

/// Deadline and cancellation for a single remote call
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Wrap `message`, advertising the deadline to the server
    fn request<T>(&self, message: T) -> Request<T> {
        let mut request = Request::new(message);
        if let Some(timeout) = self.timeout {
            request.set_timeout(timeout);
        }
        request
    }

    /// Run `call`, bounded by this context's deadline and cancellation
    async fn run<T, F>(&self, call: F) -> std::result::Result<T, Status>
    where
        F: Future<Output = std::result::Result<T, Status>>,
    {
        let bounded = async {
            match self.timeout {
                Some(timeout) => tokio::time::timeout(timeout, call)
                    .await
                    .unwrap_or_else(|_| Err(Status::deadline_exceeded("context deadline exceeded"))),
                None => call.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Status::cancelled("context canceled")),
            res = bounded => res,
        }
    }
}

/// Client for the Order service.
///
/// Cheap to clone and safe to share between tasks; it holds no mutable
/// state of its own.
///
/// # Example
///
/// ```rust,no_run
/// use order_client::{CallContext, OrderClient, OrderedProduct};
///
/// # async fn example() -> anyhow::Result<()> {
/// let client = OrderClient::connect("localhost:50051").await?;
///
/// let order = client
///     .submit_order(&CallContext::new(), "account-1", vec![OrderedProduct::new("p1", 2)])
///     .await?;
/// println!("created order {}", order.id);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct OrderClient<S = OrderServiceClient<Channel>> {
    service: S,
    timestamps: TimestampPolicy,
    default_timeout: Option<Duration>,
}

impl OrderClient<OrderServiceClient<Channel>> {
    /// Connect with the default retry policy
    pub async fn connect(address: &str) -> Result<Self> {
        let channel = Connector::default().connect(address).await?;
        Ok(Self::new(channel))
    }

    /// Connect using every setting in `config`
    pub async fn from_config(config: &ClientConfig) -> Result<Self> {
        let channel = Connector::new(config.retry).connect(&config.address).await?;

        let mut client = Self::new(channel).with_timestamp_policy(config.timestamps);
        if let Some(timeout) = config.request_timeout() {
            client = client.with_default_timeout(timeout);
        }
        Ok(client)
    }

    /// Wrap an already established channel
    pub fn new(channel: Channel) -> Self {
        Self::with_stub(OrderServiceClient::new(channel))
    }
}

impl<S: OrderStub> OrderClient<S> {
    pub fn with_stub(service: S) -> Self {
        Self {
            service,
            timestamps: TimestampPolicy::default(),
            default_timeout: None,
        }
    }

    pub fn with_timestamp_policy(mut self, timestamps: TimestampPolicy) -> Self {
        self.timestamps = timestamps;
        self
    }

    /// Deadline for calls whose context sets none
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    pub fn timestamp_policy(&self) -> TimestampPolicy {
        self.timestamps
    }

    /// Drop the client and with it this handle's channel; equivalent to
    /// `drop`.
    ///
    /// Not a graceful shutdown: in-flight calls on clones keep the channel
    /// alive, and nothing waits for them.
    pub fn close(self) {
        debug!("Closing order service client");
    }

    fn effective<'a>(&self, ctx: &'a CallContext) -> std::borrow::Cow<'a, CallContext> {
        match (ctx.timeout, self.default_timeout) {
            (None, Some(timeout)) => std::borrow::Cow::Owned(ctx.clone().with_timeout(timeout)),
            _ => std::borrow::Cow::Borrowed(ctx),
        }
    }

    /// Submit a new order for `account_id`.
    ///
    /// Only product ids and quantities are sent. The returned order carries
    /// `products` exactly as passed in, whatever lines the service echoes.
    ///
    /// # Errors
    ///
    /// - `Rpc` with the service's status, unchanged
    /// - `MissingOrder` if the response has no order
    /// - `Timestamp` under [`TimestampPolicy::Strict`] when the creation
    ///   time does not decode
    #[instrument(skip(self, ctx, products), fields(products = products.len()))]
    pub async fn submit_order(
        &self,
        ctx: &CallContext,
        account_id: &str,
        products: Vec<OrderedProduct>,
    ) -> Result<Order> {
        let ctx = self.effective(ctx);
        let request = ctx.request(PostOrderRequest {
            account_id: account_id.to_string(),
            products: products.iter().map(OrderedProduct::to_request).collect(),
        });

        let response = ctx.run(self.service.post_order(request)).await?.into_inner();
        let order = response.order.ok_or(OrderClientError::MissingOrder)?;

        let order = Order::from_wire(order, Some(products), self.timestamps)?;
        info!(order_id = %order.id, total_price = order.total_price, "Order submitted");
        Ok(order)
    }

    /// Fetch every order placed by `account_id`, with full product details.
    ///
    /// An account without orders yields an empty `Vec`.
    #[instrument(skip(self, ctx))]
    pub async fn list_orders_for_account(&self, ctx: &CallContext, account_id: &str) -> Result<Vec<Order>> {
        let ctx = self.effective(ctx);
        let request = ctx.request(GetOrdersForAccountRequest {
            account_id: account_id.to_string(),
        });

        let response = match ctx.run(self.service.get_orders_for_account(request)).await {
            Ok(response) => response.into_inner(),
            Err(status) => {
                error!(error = %status, "Failed to fetch orders for account");
                return Err(status.into());
            }
        };

        let orders = response
            .orders
            .into_iter()
            .map(|order| Order::from_wire(order, None, self.timestamps))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!(count = orders.len(), "Fetched orders for account");
        Ok(orders)
    }
}
