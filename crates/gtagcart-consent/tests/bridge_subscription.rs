//! The bridge against a stand-in consent management platform.

use gtagcart_consent::{ConsentBridge, ConsentChanges, ConsentHandler, ConsentSource, SubscriptionState};
use gtagcart_core::{ConsentMode, TagCommand, TagQueue, TagSink};
use serde_json::json;
use std::sync::Arc;

#[derive(Default)]
struct FakePlatform {
    listeners: Vec<ConsentHandler>,
}

impl FakePlatform {
    fn change(&self, category: &str, value: &str) {
        let mut changes = ConsentChanges::new();
        changes.insert(category.to_string(), value.to_string());
        for listener in &self.listeners {
            listener(&changes);
        }
    }
}

impl ConsentSource for FakePlatform {
    fn listen(&mut self, handler: ConsentHandler) {
        self.listeners.push(handler);
    }
}

#[test]
fn subscribed_bridge_forwards_each_change_immediately() {
    let queue = Arc::new(TagQueue::installed());
    let mut bridge = ConsentBridge::new(Some(queue.clone() as Arc<dyn TagSink>));
    let mut platform = FakePlatform::default();

    assert_eq!(
        bridge.attach(Some(&mut platform)),
        SubscriptionState::Subscribed
    );

    platform.change("statistics", "allow");
    platform.change("marketing", "deny");
    platform.change("functional", "allow");

    let entries = queue.snapshot();
    assert_eq!(entries.len(), 2);
    assert_eq!(
        entries[0].command,
        TagCommand::Consent {
            mode: ConsentMode::Update,
            params: json!({"analytics_storage": "granted"})
                .as_object()
                .cloned()
                .expect("object literal"),
        }
    );
    let TagCommand::Consent { params, .. } = &entries[1].command else {
        panic!("expected consent update");
    };
    assert_eq!(params["ad_storage"], json!("denied"));
}

#[test]
fn attaching_twice_registers_one_listener() {
    let queue = Arc::new(TagQueue::installed());
    let mut bridge = ConsentBridge::new(Some(queue.clone() as Arc<dyn TagSink>));
    let mut platform = FakePlatform::default();

    bridge.attach(Some(&mut platform));
    bridge.attach(Some(&mut platform));
    assert_eq!(platform.listeners.len(), 1);

    platform.change("statistics", "deny");
    assert_eq!(queue.len(), 1);
}

#[test]
fn missing_platform_is_silently_ignored() {
    let mut bridge = ConsentBridge::new(Some(Arc::new(TagQueue::installed()) as Arc<dyn TagSink>));
    assert_eq!(bridge.attach(None), SubscriptionState::NotSubscribed);
    assert_eq!(bridge.state(), SubscriptionState::NotSubscribed);
}
