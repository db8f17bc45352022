#![warn(clippy::unwrap_used, clippy::expect_used)]

//! Core types shared by the gtagcart crates: storefront snapshots, the
//! context handed to event formatters, tag commands and reporting sinks.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub mod catalog;
pub mod event;
pub mod settings;
pub mod sink;
pub mod snippet;

pub use catalog::{
    format_price, price_value, CartSnapshot, Category, OrderSnapshot, PriceError, ProductIdentifier,
    ProductRef,
};
pub use settings::{ConsentDefaults, ConsentValue, TrackingSettings};
pub use sink::{ConsentMode, SinkError, TagCommand, TagQueue, TagSink};

/// Flat JSON object sent as the third `gtag` argument.
pub type Payload = Map<String, Value>;

/// Everything a storefront signal may carry. Formatters pick the fields they
/// need and treat the rest as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub products: Option<Vec<ProductRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cart: Option<CartSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_term: Option<String>,
    /// Notice status, e.g. `"error"` or `"success"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl EventContext {
    #[must_use]
    pub fn product(product: ProductRef, quantity: u32) -> Self {
        Self {
            product: Some(product),
            quantity: Some(quantity),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn list(products: Vec<ProductRef>) -> Self {
        Self {
            products: Some(products),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn cart(cart: CartSnapshot) -> Self {
        Self {
            cart: Some(cart),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn order(order: OrderSnapshot) -> Self {
        Self {
            order: Some(order),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn search(term: impl Into<String>) -> Self {
        Self {
            search_term: Some(term.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn notice(status: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_list_name(mut self, name: impl Into<String>) -> Self {
        self.list_name = Some(name.into());
        self
    }
}
