//! GA4 formatters: storefront context in, `gtag` event payload out.
//!
//! Every formatter returns `Ok(None)` when there is nothing worth reporting
//! (an empty product list, a notice that is not an error, a product without
//! prices). Only a missing primary input, or data that is present but
//! malformed, is an error.

use crate::error::FormatError;
use crate::registry::FormatResult;
use gtagcart_core::{
    format_price, price_value, CartSnapshot, Category, EventContext, Payload, ProductIdentifier,
    ProductRef,
};
use serde_json::Value;

pub const ADD_TO_CART: &str = "add_to_cart";
pub const REMOVE_FROM_CART: &str = "remove_from_cart";
pub const BEGIN_CHECKOUT: &str = "begin_checkout";
pub const ADD_SHIPPING_INFO: &str = "add_shipping_info";
pub const VIEW_ITEM_LIST: &str = "view_item_list";
pub const VIEW_ITEM: &str = "view_item";
pub const SELECT_CONTENT: &str = "select_content";
pub const SEARCH: &str = "search";
pub const EXCEPTION: &str = "exception";
pub const PURCHASE: &str = "purchase";

/// GA4 accepts at most five category levels per item.
pub const MAX_CATEGORIES: usize = 5;

pub const DEFAULT_LIST_ID: &str = "engagement";
pub const DEFAULT_LIST_NAME: &str = "Product List";

fn category_key(index: usize) -> String {
    if index == 0 {
        "item_category".to_string()
    } else {
        format!("item_category{}", index + 1)
    }
}

/// `item_category`, `item_category2`, ... for the first five categories.
#[must_use]
pub fn category_fields(categories: &[Category]) -> Payload {
    categories
        .iter()
        .take(MAX_CATEGORIES)
        .enumerate()
        .map(|(index, category)| (category_key(index), Value::from(category.name.as_str())))
        .collect()
}

/// One entry of an `items` array.
///
/// `Ok(None)` when the product carries no prices.
pub fn product_line(
    product: &ProductRef,
    quantity: u32,
    identifier: ProductIdentifier,
) -> Result<Option<Payload>, FormatError> {
    let Some(prices) = &product.prices else {
        return Ok(None);
    };
    let price = format_price(&prices.price, prices.currency_minor_unit)?;

    let mut line = Payload::new();
    line.insert("item_id".into(), Value::from(product.item_id(identifier)));
    line.insert("item_name".into(), Value::from(product.name.as_str()));
    line.insert("quantity".into(), Value::from(quantity));
    line.extend(category_fields(&product.categories));
    if let Some(variant) = product.variant_label() {
        line.insert("item_variant".into(), Value::from(variant));
    }
    line.insert("price".into(), price_value(price));
    Ok(Some(line))
}

/// Lines for every product, each at its own quantity (default 1). A single
/// unreportable product drops the whole list.
fn product_lines(
    products: &[ProductRef],
    identifier: ProductIdentifier,
) -> Result<Option<Vec<Value>>, FormatError> {
    let mut lines = Vec::with_capacity(products.len());
    for product in products {
        match product_line(product, product.quantity.unwrap_or(1), identifier)? {
            Some(line) => lines.push(Value::Object(line)),
            None => return Ok(None),
        }
    }
    Ok(Some(lines))
}

/// `add_to_cart` / `remove_from_cart`.
pub fn cart_item(ctx: &EventContext, identifier: ProductIdentifier) -> FormatResult {
    let mut items = Vec::new();
    if let Some(product) = &ctx.product {
        match product_line(product, ctx.quantity.unwrap_or(1), identifier)? {
            Some(line) => items.push(Value::Object(line)),
            None => return Ok(None),
        }
    }
    let mut payload = Payload::new();
    payload.insert("items".into(), Value::Array(items));
    Ok(Some(payload))
}

fn cart_payload(cart: &CartSnapshot, identifier: ProductIdentifier) -> FormatResult {
    let Some(items) = product_lines(&cart.items, identifier)? else {
        return Ok(None);
    };
    let value = format_price(&cart.totals.total_price, cart.totals.currency_minor_unit)?;

    let mut payload = Payload::new();
    payload.insert(
        "currency".into(),
        Value::from(cart.totals.currency_code.as_str()),
    );
    payload.insert("value".into(), price_value(value));
    if let Some(coupon) = cart.coupon_code() {
        payload.insert("coupon".into(), Value::from(coupon));
    }
    payload.insert("items".into(), Value::Array(items));
    Ok(Some(payload))
}

/// `begin_checkout`.
pub fn begin_checkout(ctx: &EventContext, identifier: ProductIdentifier) -> FormatResult {
    let cart = ctx.cart.as_ref().ok_or(FormatError::MissingField("cart"))?;
    cart_payload(cart, identifier)
}

/// `add_shipping_info`: the checkout payload plus the selected shipping tier.
pub fn add_shipping_info(ctx: &EventContext, identifier: ProductIdentifier) -> FormatResult {
    let cart = ctx.cart.as_ref().ok_or(FormatError::MissingField("cart"))?;
    let Some(mut payload) = cart_payload(cart, identifier)? else {
        return Ok(None);
    };
    let tier = cart
        .selected_shipping_rate()
        .map(|rate| rate.name.as_str())
        .unwrap_or_default();
    payload.insert("shipping_tier".into(), Value::from(tier));
    Ok(Some(payload))
}

/// `view_item_list`. An empty or absent list is not reported.
pub fn view_item_list(ctx: &EventContext, identifier: ProductIdentifier) -> FormatResult {
    let products = match &ctx.products {
        Some(products) if !products.is_empty() => products,
        _ => return Ok(None),
    };

    let mut items = Vec::with_capacity(products.len());
    for (index, product) in products.iter().enumerate() {
        let Some(mut line) = product_line(product, product.quantity.unwrap_or(1), identifier)?
        else {
            return Ok(None);
        };
        line.insert("index".into(), Value::from(index + 1));
        items.push(Value::Object(line));
    }

    let mut payload = Payload::new();
    payload.insert(
        "item_list_id".into(),
        Value::from(ctx.list_id.as_deref().unwrap_or(DEFAULT_LIST_ID)),
    );
    payload.insert(
        "item_list_name".into(),
        Value::from(ctx.list_name.as_deref().unwrap_or(DEFAULT_LIST_NAME)),
    );
    payload.insert("items".into(), Value::Array(items));
    Ok(Some(payload))
}

/// `view_item` for a single product page.
pub fn view_item(ctx: &EventContext, identifier: ProductIdentifier) -> FormatResult {
    let Some(product) = &ctx.product else {
        return Ok(None);
    };
    let Some(line) = product_line(product, 1, identifier)? else {
        return Ok(None);
    };
    let mut payload = Payload::new();
    payload.insert("items".into(), Value::Array(vec![Value::Object(line)]));
    Ok(Some(payload))
}

/// `select_content` when a product link is followed.
pub fn select_content(ctx: &EventContext, identifier: ProductIdentifier) -> FormatResult {
    let Some(product) = &ctx.product else {
        return Ok(None);
    };
    let mut payload = Payload::new();
    payload.insert("content_type".into(), Value::from("product"));
    payload.insert("content_id".into(), Value::from(product.item_id(identifier)));
    Ok(Some(payload))
}

/// `search`.
pub fn search(ctx: &EventContext) -> FormatResult {
    let term = match ctx.search_term.as_deref().map(str::trim) {
        Some(term) if !term.is_empty() => term,
        _ => return Ok(None),
    };
    let mut payload = Payload::new();
    payload.insert("search_term".into(), Value::from(term));
    Ok(Some(payload))
}

/// `exception` for store notices; only error notices are reported.
pub fn exception(ctx: &EventContext) -> FormatResult {
    if ctx.status.as_deref() != Some("error") {
        return Ok(None);
    }
    let mut payload = Payload::new();
    payload.insert(
        "description".into(),
        Value::from(ctx.message.as_deref().unwrap_or_default()),
    );
    payload.insert("fatal".into(), Value::Bool(false));
    Ok(Some(payload))
}

/// `purchase`, reported once per completed order.
pub fn purchase(ctx: &EventContext, identifier: ProductIdentifier) -> FormatResult {
    let order = ctx.order.as_ref().ok_or(FormatError::MissingField("order"))?;
    let Some(items) = product_lines(&order.items, identifier)? else {
        return Ok(None);
    };
    let exp = order.currency_minor_unit;

    let mut payload = Payload::new();
    payload.insert(
        "transaction_id".into(),
        Value::from(order.transaction_id.as_str()),
    );
    payload.insert("affiliation".into(), Value::from(order.affiliation.as_str()));
    payload.insert("currency".into(), Value::from(order.currency.as_str()));
    payload.insert("value".into(), price_value(format_price(&order.value, exp)?));
    payload.insert("tax".into(), price_value(format_price(&order.tax, exp)?));
    payload.insert(
        "shipping".into(),
        price_value(format_price(&order.shipping, exp)?),
    );
    if let Some(coupon) = order.coupon.as_deref().filter(|c| !c.is_empty()) {
        payload.insert("coupon".into(), Value::from(coupon));
    }
    payload.insert("items".into(), Value::Array(items));
    Ok(Some(payload))
}
