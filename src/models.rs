/*!
 * Domain types for orders and their wire mapping
 */

use chrono::{DateTime, Utc};
use order_proto::{order, post_order_request};
use serde::{Deserialize, Serialize};

use crate::timestamp::{TimestampError, TimestampPolicy};

/// An order as materialized by the client after a successful call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub total_price: f64,
    pub account_id: String,
    pub products: Vec<OrderedProduct>,
}

/// A product line within an order.
///
/// `details` is only filled in for orders read back from the service;
/// products built for submission carry the id and quantity alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderedProduct {
    pub id: String,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ProductDetails>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub name: String,
    pub description: String,
    pub price: f64,
}

impl OrderedProduct {
    /// A product line ready to be submitted
    pub fn new(id: impl Into<String>, quantity: u32) -> Self {
        Self {
            id: id.into(),
            quantity,
            details: None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.details.as_ref().map(|d| d.name.as_str())
    }

    pub fn description(&self) -> Option<&str> {
        self.details.as_ref().map(|d| d.description.as_str())
    }

    pub fn price(&self) -> Option<f64> {
        self.details.as_ref().map(|d| d.price)
    }

    /// Request shape for submission; pricing never goes on the wire
    pub(crate) fn to_request(&self) -> post_order_request::OrderProduct {
        post_order_request::OrderProduct {
            product_id: self.id.clone(),
            quantity: self.quantity,
        }
    }
}

impl From<order::OrderProduct> for OrderedProduct {
    fn from(p: order::OrderProduct) -> Self {
        Self {
            id: p.id,
            quantity: p.quantity,
            details: Some(ProductDetails {
                name: p.name,
                description: p.description,
                price: p.price,
            }),
        }
    }
}

impl Order {
    /// Build an order from a wire message.
    ///
    /// `products` replaces the message's own product list when given;
    /// submission keeps the caller's input instead of the echoed lines.
    pub(crate) fn from_wire(
        msg: order_proto::Order,
        products: Option<Vec<OrderedProduct>>,
        timestamps: TimestampPolicy,
    ) -> Result<Self, TimestampError> {
        let created_at = timestamps.resolve(&msg.id, &msg.created_at)?;
        let products = match products {
            Some(products) => products,
            None => msg.products.into_iter().map(OrderedProduct::from).collect(),
        };

        Ok(Self {
            id: msg.id,
            created_at,
            total_price: msg.total_price,
            account_id: msg.account_id,
            products,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp;

    fn wire_order(created_at: Vec<u8>) -> order_proto::Order {
        order_proto::Order {
            id: "order-1".to_string(),
            created_at,
            account_id: "acc-1".to_string(),
            total_price: 42.5,
            products: vec![order::OrderProduct {
                id: "p1".to_string(),
                name: "Widget".to_string(),
                description: "A widget".to_string(),
                price: 21.25,
                quantity: 2,
            }],
        }
    }

    #[test]
    fn test_from_wire_uses_response_products() {
        let now = Utc::now();
        let order = Order::from_wire(wire_order(timestamp::encode(&now).unwrap()), None, TimestampPolicy::Strict).unwrap();

        assert_eq!(order.id, "order-1");
        assert_eq!(order.account_id, "acc-1");
        assert_eq!(order.total_price, 42.5);
        assert_eq!(order.created_at, now);
        assert_eq!(order.products.len(), 1);
        assert_eq!(order.products[0].name(), Some("Widget"));
        assert_eq!(order.products[0].description(), Some("A widget"));
        assert_eq!(order.products[0].price(), Some(21.25));
    }

    #[test]
    fn test_from_wire_with_override_products() {
        let input = vec![OrderedProduct::new("p9", 7)];
        let order = Order::from_wire(
            wire_order(timestamp::encode(&Utc::now()).unwrap()),
            Some(input.clone()),
            TimestampPolicy::Lenient,
        )
        .unwrap();

        assert_eq!(order.products, input);
        assert!(order.products[0].details.is_none());
    }

    #[test]
    fn test_from_wire_bad_timestamp() {
        let lenient = Order::from_wire(wire_order(vec![0xff]), None, TimestampPolicy::Lenient).unwrap();
        assert_eq!(lenient.created_at, timestamp::zero());

        let strict = Order::from_wire(wire_order(vec![0xff]), None, TimestampPolicy::Strict);
        assert_eq!(strict.unwrap_err(), TimestampError::UnsupportedVersion(0xff));
    }

    #[test]
    fn test_to_request_drops_details() {
        let product = OrderedProduct {
            id: "p1".to_string(),
            quantity: 3,
            details: Some(ProductDetails {
                name: "Widget".to_string(),
                description: String::new(),
                price: 1.0,
            }),
        };

        let wire = product.to_request();
        assert_eq!(wire.product_id, "p1");
        assert_eq!(wire.quantity, 3);
    }
}
