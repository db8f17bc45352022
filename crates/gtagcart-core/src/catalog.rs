//! Storefront snapshots handed to the formatters.
//!
//! Field names follow the WooCommerce Store API JSON so cart and product
//! payloads from the storefront deserialize without a mapping layer. All
//! monetary amounts are integer minor-unit strings paired with the currency's
//! minor-unit exponent.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use thiserror::Error;

/// Upper bound for the minor-unit exponent; `10^18` is the largest power of
/// ten that still converts to `f64` without rounding surprises.
pub const MAX_MINOR_UNIT: u32 = 18;

/// Whole amounts below this magnitude are rendered as JSON integers; it stays
/// under `2^53`, so every such `f64` is an exact integer.
pub const MAX_INTEGER_PRICE: f64 = 9.0e15;

/// Failure to interpret a minor-unit price.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PriceError {
    #[error("price `{0}` is not an integer minor-unit amount")]
    NotAnInteger(String),
    #[error("currency minor unit {0} is out of range")]
    MinorUnitOutOfRange(u32),
}

/// Convert an integer minor-unit amount to its major-unit value.
///
/// `format_price("1999", 2)` is `19.99`. Surrounding whitespace is ignored;
/// anything else that is not an integer is rejected.
#[allow(clippy::cast_precision_loss)]
pub fn format_price(price: &str, minor_unit: u32) -> Result<f64, PriceError> {
    let amount: i64 = price
        .trim()
        .parse()
        .map_err(|_| PriceError::NotAnInteger(price.to_string()))?;
    if minor_unit > MAX_MINOR_UNIT {
        return Err(PriceError::MinorUnitOutOfRange(minor_unit));
    }
    let divisor = 10_i64.pow(minor_unit);
    Ok(amount as f64 / divisor as f64)
}

/// Render a major-unit amount as a JSON number the way a browser would print
/// it: whole amounts become integers (`50`, not `50.0`).
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
pub fn price_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < MAX_INTEGER_PRICE {
        return Value::from(value as i64);
    }
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

/// Which product field is reported as `item_id`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductIdentifier {
    /// Numeric catalog id.
    ProductId,
    /// SKU, falling back to `#<id>` when the product has none.
    #[default]
    ProductSku,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prices {
    /// Integer amount in minor units, e.g. `"1999"`.
    pub price: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency_code: Option<String>,
    #[serde(default)]
    pub currency_minor_unit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
}

impl From<&str> for Category {
    fn from(name: &str) -> Self {
        Self { name: name.to_string() }
    }
}

/// A single catalog item as the storefront saw it when the signal fired.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRef {
    pub id: u64,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub name: String,
    /// Missing prices make the product unreportable; formatters drop the
    /// event instead of guessing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prices: Option<Prices>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<Category>,
    /// Display label of the selected variant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variation: Option<String>,
    /// Line quantity when the product comes from a cart or order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
}

impl ProductRef {
    /// Identifier reported as `item_id` under the given preference.
    #[must_use]
    pub fn item_id(&self, identifier: ProductIdentifier) -> String {
        match identifier {
            ProductIdentifier::ProductSku if !self.sku.is_empty() => self.sku.clone(),
            ProductIdentifier::ProductSku => format!("#{}", self.id),
            ProductIdentifier::ProductId => self.id.to_string(),
        }
    }

    /// Non-empty variant label, if any.
    #[must_use]
    pub fn variant_label(&self) -> Option<&str> {
        self.variation.as_deref().filter(|v| !v.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartTotals {
    pub currency_code: String,
    #[serde(default)]
    pub currency_minor_unit: u32,
    pub total_price: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingRate {
    #[serde(default)]
    pub rate_id: String,
    pub name: String,
    #[serde(default)]
    pub selected: bool,
}

/// Rates offered for one shipping package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingPackage {
    #[serde(default)]
    pub shipping_rates: Vec<ShippingRate>,
}

/// Read-only view of the cart at the time of the signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    #[serde(default)]
    pub items: Vec<ProductRef>,
    #[serde(default)]
    pub coupons: Vec<Coupon>,
    pub totals: CartTotals,
    #[serde(default)]
    pub shipping_rates: Vec<ShippingPackage>,
}

impl CartSnapshot {
    /// First applied coupon code; later coupons are not reported.
    #[must_use]
    pub fn coupon_code(&self) -> Option<&str> {
        self.coupons
            .first()
            .map(|c| c.code.as_str())
            .filter(|c| !c.is_empty())
    }

    /// The rate marked as selected in the first shipping package.
    #[must_use]
    pub fn selected_shipping_rate(&self) -> Option<&ShippingRate> {
        self.shipping_rates
            .first()?
            .shipping_rates
            .iter()
            .find(|r| r.selected)
    }
}

/// Completed order, reported once on the order-received page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub transaction_id: String,
    /// Store name.
    #[serde(default)]
    pub affiliation: String,
    pub currency: String,
    #[serde(default)]
    pub currency_minor_unit: u32,
    /// Order total in minor units.
    pub value: String,
    #[serde(default = "zero_amount")]
    pub tax: String,
    #[serde(default = "zero_amount")]
    pub shipping: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon: Option<String>,
    #[serde(default)]
    pub items: Vec<ProductRef>,
}

fn zero_amount() -> String {
    "0".to_string()
}
