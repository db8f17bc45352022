//! Storefront scenarios end to end: JSON context in, queued `gtag` call out.

use gtagcart_core::sink::QueuedCommand;
use gtagcart_core::{EventContext, Payload, TagCommand, TagQueue, TrackingSettings};
use gtagcart_events::{DispatchError, Dispatcher, FormatResult, Outcome};
use serde_json::{json, Value};
use std::sync::Arc;

fn dispatcher() -> (Dispatcher, Arc<TagQueue>) {
    let queue = Arc::new(TagQueue::installed());
    let dispatcher = Dispatcher::from_settings(&TrackingSettings::default()).with_sink(queue.clone());
    (dispatcher, queue)
}

fn context(value: Value) -> EventContext {
    serde_json::from_value(value).expect("Failed to deserialize context")
}

fn only_payload(entries: &[QueuedCommand]) -> &Payload {
    assert_eq!(entries.len(), 1, "expected exactly one queued command");
    match &entries[0].command {
        TagCommand::Event { payload, .. } => payload,
        other => panic!("expected an event, got {other:?}"),
    }
}

#[test]
fn add_to_cart_for_product_without_sku() {
    let (dispatcher, queue) = dispatcher();
    let ctx = context(json!({
        "product": {
            "id": 42,
            "sku": "",
            "name": "Classic Tee",
            "categories": [{"name": "Shirts"}, {"name": "Sale"}],
            "prices": {"price": "1999", "currency_minor_unit": 2}
        },
        "quantity": 1
    }));

    assert_eq!(dispatcher.dispatch("add_to_cart", &ctx), Ok(Outcome::Sent));

    let entries = queue.snapshot();
    assert_eq!(
        Value::Object(only_payload(&entries).clone()),
        json!({
            "items": [{
                "item_id": "#42",
                "item_name": "Classic Tee",
                "quantity": 1,
                "item_category": "Shirts",
                "item_category2": "Sale",
                "price": 19.99
            }]
        })
    );
}

#[test]
fn empty_product_list_is_suppressed_not_an_error() {
    let (dispatcher, queue) = dispatcher();
    let ctx = context(json!({"products": [], "list_name": "Search results"}));

    assert_eq!(dispatcher.dispatch("view_item_list", &ctx), Ok(Outcome::Suppressed));
    assert!(queue.is_empty());
}

#[test]
fn begin_checkout_with_coupon() {
    let (dispatcher, queue) = dispatcher();
    let ctx = context(json!({
        "cart": {
            "items": [{
                "id": 7,
                "sku": "BEANIE",
                "name": "Beanie",
                "quantity": 2,
                "prices": {"price": "2500", "currency_minor_unit": 2}
            }],
            "coupons": [{"code": "SAVE10"}],
            "totals": {"currency_code": "USD", "currency_minor_unit": 2, "total_price": "5000"}
        }
    }));

    assert_eq!(dispatcher.dispatch("begin_checkout", &ctx), Ok(Outcome::Sent));

    let entries = queue.snapshot();
    let payload = only_payload(&entries);
    assert_eq!(payload["coupon"], json!("SAVE10"));
    assert_eq!(payload["value"], json!(50));
    assert_eq!(payload["currency"], json!("USD"));
    assert_eq!(payload["items"][0]["quantity"], json!(2));
    assert_eq!(payload["items"][0]["item_id"], json!("BEANIE"));
}

#[test]
fn shipping_info_without_rates_has_empty_tier() {
    let (dispatcher, queue) = dispatcher();
    let ctx = context(json!({
        "cart": {
            "totals": {"currency_code": "USD", "currency_minor_unit": 2, "total_price": "0"}
        }
    }));

    assert_eq!(dispatcher.dispatch("add_shipping_info", &ctx), Ok(Outcome::Sent));
    let entries = queue.snapshot();
    assert_eq!(only_payload(&entries)["shipping_tier"], json!(""));
}

#[test]
fn unregistered_event_is_not_supported() {
    let (dispatcher, queue) = dispatcher();
    assert_eq!(
        dispatcher.dispatch("view_promotion", &EventContext::default()),
        Err(DispatchError::NotSupported("view_promotion".into()))
    );
    assert!(queue.is_empty());
}

#[test]
fn last_registration_wins() {
    let (mut dispatcher, queue) = dispatcher();
    for tag in ["first", "second", "third"] {
        dispatcher
            .register("search", move |_ctx: &EventContext| -> FormatResult {
                let mut payload = Payload::new();
                payload.insert("version".into(), json!(tag));
                Ok(Some(payload))
            })
            .expect("last-write-wins registry accepts overrides");
    }

    dispatcher
        .dispatch("search", &EventContext::search("anything"))
        .expect("search should dispatch");
    let entries = queue.snapshot();
    assert_eq!(only_payload(&entries)["version"], json!("third"));
}

#[test]
fn product_id_preference_from_settings() {
    let queue = Arc::new(TagQueue::installed());
    let settings: TrackingSettings = serde_json::from_value(json!({
        "product_identifier": "product_id"
    }))
    .expect("Failed to deserialize settings");
    let dispatcher = Dispatcher::from_settings(&settings).with_sink(queue.clone());

    let ctx = context(json!({
        "product": {"id": 42, "sku": "TEE", "name": "Tee", "prices": {"price": "100", "currency_minor_unit": 2}}
    }));
    dispatcher
        .dispatch("select_content", &ctx)
        .expect("select_content should dispatch");

    let entries = queue.snapshot();
    assert_eq!(only_payload(&entries)["content_id"], json!("42"));
}
