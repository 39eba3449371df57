//! Integration tests for OrderClient against an in-process mock stub

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use order_client::timestamp;
use order_client::{
    CallContext, OrderClient, OrderClientError, OrderStub, OrderedProduct, TimestampError,
    TimestampPolicy,
};
use order_proto::{
    order, GetOrdersForAccountRequest, GetOrdersForAccountResponse, PostOrderRequest,
    PostOrderResponse,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};

/// Canned responses plus a record of what the client sent
#[derive(Default)]
struct MockOrderService {
    post_response: Option<Result<PostOrderResponse, Status>>,
    list_response: Option<Result<GetOrdersForAccountResponse, Status>>,
    delay: Option<Duration>,
    posted: Mutex<Vec<PostOrderRequest>>,
    listed: Mutex<Vec<(String, Option<String>)>>,
}

#[async_trait]
impl OrderStub for MockOrderService {
    async fn post_order(&self, request: Request<PostOrderRequest>) -> Result<Response<PostOrderResponse>, Status> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.posted.lock().unwrap().push(request.into_inner());
        self.post_response
            .clone()
            .unwrap_or_else(|| Err(Status::unimplemented("post_order")))
            .map(Response::new)
    }

    async fn get_orders_for_account(
        &self,
        request: Request<GetOrdersForAccountRequest>,
    ) -> Result<Response<GetOrdersForAccountResponse>, Status> {
        let timeout = request
            .metadata()
            .get("grpc-timeout")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.listed
            .lock()
            .unwrap()
            .push((request.into_inner().account_id, timeout));
        self.list_response
            .clone()
            .unwrap_or_else(|| Err(Status::unimplemented("get_orders_for_account")))
            .map(Response::new)
    }
}

fn created_at_blob() -> Vec<u8> {
    timestamp::encode(&Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()).unwrap()
}

fn wire_product(id: &str, quantity: u32, price: f64) -> order::OrderProduct {
    order::OrderProduct {
        id: id.to_string(),
        name: format!("{} name", id),
        description: format!("{} description", id),
        price,
        quantity,
    }
}

fn wire_order(id: &str, products: Vec<order::OrderProduct>) -> order_proto::Order {
    order_proto::Order {
        id: id.to_string(),
        created_at: created_at_blob(),
        account_id: "acc-1".to_string(),
        total_price: 99.5,
        products,
    }
}

fn client(mock: MockOrderService) -> (OrderClient<Arc<MockOrderService>>, Arc<MockOrderService>) {
    let mock = Arc::new(mock);
    (OrderClient::with_stub(mock.clone()), mock)
}

#[tokio::test]
async fn test_submit_order_keeps_input_products() {
    let (client, mock) = client(MockOrderService {
        post_response: Some(Ok(PostOrderResponse {
            // The server echoes a different product list
            order: Some(wire_order("order-1", vec![wire_product("other", 9, 1.0)])),
        })),
        ..Default::default()
    });

    let products = vec![OrderedProduct::new("p1", 2)];
    let order = client
        .submit_order(&CallContext::new(), "acc-1", products.clone())
        .await
        .unwrap();

    assert_eq!(order.id, "order-1");
    assert_eq!(order.account_id, "acc-1");
    assert_eq!(order.total_price, 99.5);
    assert_eq!(order.created_at, Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
    assert_eq!(order.products, products);

    let posted = mock.posted.lock().unwrap();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].account_id, "acc-1");
    assert_eq!(posted[0].products.len(), 1);
    assert_eq!(posted[0].products[0].product_id, "p1");
    assert_eq!(posted[0].products[0].quantity, 2);
}

#[tokio::test]
async fn test_submit_order_passes_status_through() {
    let (client, _) = client(MockOrderService {
        post_response: Some(Err(Status::invalid_argument("quantity must be positive"))),
        ..Default::default()
    });

    let err = client
        .submit_order(&CallContext::new(), "acc-1", vec![OrderedProduct::new("p1", 0)])
        .await
        .unwrap_err();

    let status = err.status().expect("remote status");
    assert_eq!(status.code(), tonic::Code::InvalidArgument);
    assert_eq!(status.message(), "quantity must be positive");
}

#[tokio::test]
async fn test_submit_order_without_order_body() {
    let (client, _) = client(MockOrderService {
        post_response: Some(Ok(PostOrderResponse { order: None })),
        ..Default::default()
    });

    let err = client
        .submit_order(&CallContext::new(), "acc-1", vec![OrderedProduct::new("p1", 1)])
        .await
        .unwrap_err();

    assert!(matches!(err, OrderClientError::MissingOrder));
}

#[tokio::test(start_paused = true)]
async fn test_submit_order_deadline() {
    let (client, _) = client(MockOrderService {
        post_response: Some(Ok(PostOrderResponse {
            order: Some(wire_order("order-1", vec![])),
        })),
        delay: Some(Duration::from_secs(10)),
        ..Default::default()
    });

    let ctx = CallContext::new().with_timeout(Duration::from_secs(1));
    let err = client
        .submit_order(&ctx, "acc-1", vec![OrderedProduct::new("p1", 1)])
        .await
        .unwrap_err();

    assert_eq!(err.status().unwrap().code(), tonic::Code::DeadlineExceeded);
}

#[tokio::test]
async fn test_submit_order_cancelled() {
    let (client, mock) = client(MockOrderService {
        post_response: Some(Ok(PostOrderResponse {
            order: Some(wire_order("order-1", vec![])),
        })),
        ..Default::default()
    });

    let cancel = CancellationToken::new();
    cancel.cancel();
    let ctx = CallContext::new().with_cancellation(cancel);

    let err = client
        .submit_order(&ctx, "acc-1", vec![OrderedProduct::new("p1", 1)])
        .await
        .unwrap_err();

    assert_eq!(err.status().unwrap().code(), tonic::Code::Cancelled);
    assert!(mock.posted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_list_orders_empty() {
    let (client, _) = client(MockOrderService {
        list_response: Some(Ok(GetOrdersForAccountResponse { orders: vec![] })),
        ..Default::default()
    });

    let orders = client
        .list_orders_for_account(&CallContext::new(), "acc-1")
        .await
        .unwrap();

    assert!(orders.is_empty());
}

#[tokio::test]
async fn test_list_orders_full_products() {
    let (client, mock) = client(MockOrderService {
        list_response: Some(Ok(GetOrdersForAccountResponse {
            orders: vec![wire_order(
                "order-1",
                vec![wire_product("p1", 2, 10.0), wire_product("p2", 1, 79.5)],
            )],
        })),
        ..Default::default()
    });

    let orders = client
        .list_orders_for_account(&CallContext::new(), "acc-1")
        .await
        .unwrap();

    assert_eq!(orders.len(), 1);
    let order = &orders[0];
    assert_eq!(order.id, "order-1");
    assert_eq!(order.total_price, 99.5);
    assert_eq!(order.created_at, Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
    assert_eq!(order.products.len(), 2);

    let p2 = &order.products[1];
    assert_eq!(p2.id, "p2");
    assert_eq!(p2.quantity, 1);
    assert_eq!(p2.name(), Some("p2 name"));
    assert_eq!(p2.description(), Some("p2 description"));
    assert_eq!(p2.price(), Some(79.5));

    assert_eq!(mock.listed.lock().unwrap()[0].0, "acc-1");
}

#[tokio::test]
async fn test_list_orders_passes_status_through() {
    let (client, _) = client(MockOrderService {
        list_response: Some(Err(Status::unavailable("order service down"))),
        ..Default::default()
    });

    let err = client
        .list_orders_for_account(&CallContext::new(), "acc-1")
        .await
        .unwrap_err();

    assert!(matches!(&err, OrderClientError::Rpc(s) if s.code() == tonic::Code::Unavailable));
    assert_eq!(err.to_string(), Status::unavailable("order service down").to_string());
}

#[tokio::test]
async fn test_list_orders_advertises_deadline() {
    let (client, mock) = client(MockOrderService {
        list_response: Some(Ok(GetOrdersForAccountResponse { orders: vec![] })),
        ..Default::default()
    });

    let ctx = CallContext::new().with_timeout(Duration::from_secs(2));
    client.list_orders_for_account(&ctx, "acc-1").await.unwrap();
    client
        .list_orders_for_account(&CallContext::new(), "acc-2")
        .await
        .unwrap();

    let listed = mock.listed.lock().unwrap();
    assert!(listed[0].1.is_some());
    assert!(listed[1].1.is_none());
}

#[tokio::test]
async fn test_malformed_timestamp_lenient() {
    let mut order = wire_order("order-1", vec![]);
    order.created_at = vec![0xde, 0xad, 0xbe, 0xef];

    let (client, _) = client(MockOrderService {
        list_response: Some(Ok(GetOrdersForAccountResponse {
            orders: vec![order.clone()],
        })),
        post_response: Some(Ok(PostOrderResponse { order: Some(order) })),
        ..Default::default()
    });

    let orders = client
        .list_orders_for_account(&CallContext::new(), "acc-1")
        .await
        .unwrap();
    assert_eq!(orders[0].created_at, timestamp::zero());

    let submitted = client
        .submit_order(&CallContext::new(), "acc-1", vec![OrderedProduct::new("p1", 1)])
        .await
        .unwrap();
    assert_eq!(submitted.created_at, timestamp::zero());
}

#[tokio::test]
async fn test_malformed_timestamp_strict() {
    let mut order = wire_order("order-1", vec![]);
    order.created_at = vec![];

    let (client, _) = client(MockOrderService {
        list_response: Some(Ok(GetOrdersForAccountResponse { orders: vec![order] })),
        ..Default::default()
    });
    let client = client.with_timestamp_policy(TimestampPolicy::Strict);

    let err = client
        .list_orders_for_account(&CallContext::new(), "acc-1")
        .await
        .unwrap_err();

    assert!(matches!(err, OrderClientError::Timestamp(TimestampError::Empty)));
}

#[tokio::test]
async fn test_client_shared_across_tasks() {
    let (client, mock) = client(MockOrderService {
        list_response: Some(Ok(GetOrdersForAccountResponse {
            orders: vec![wire_order("order-1", vec![])],
        })),
        ..Default::default()
    });

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .list_orders_for_account(&CallContext::new(), &format!("acc-{}", i))
                    .await
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().len(), 1);
    }
    assert_eq!(mock.listed.lock().unwrap().len(), 4);

    client.close();
}

#[tokio::test]
async fn test_default_timeout_applies_when_context_has_none() {
    let (client, mock) = client(MockOrderService {
        list_response: Some(Ok(GetOrdersForAccountResponse { orders: vec![] })),
        ..Default::default()
    });
    let client = client.with_default_timeout(Duration::from_secs(5));

    client
        .list_orders_for_account(&CallContext::new(), "acc-1")
        .await
        .unwrap();

    assert!(mock.listed.lock().unwrap()[0].1.is_some());
}
