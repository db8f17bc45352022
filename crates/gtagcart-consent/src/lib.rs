#![warn(clippy::unwrap_used, clippy::expect_used)]

//! Consent-state bridge.
//!
//! Consent management platforms speak in categories (`statistics`,
//! `marketing`, ...) with `allow`/`deny` values. The tag library speaks in
//! storage flags (`analytics_storage`, `ad_storage`, ...) with
//! `granted`/`denied`. This crate translates one into the other and forwards
//! every change as a `gtag('consent', 'update', ...)` call. It keeps no state
//! beyond whether it is subscribed.

use gtagcart_core::{ConsentMode, ConsentValue, Payload, TagCommand, TagSink};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Category → gtag consent flags it controls.
pub const CONSENT_MAP: &[(&str, &[&str])] = &[
    ("statistics", &["analytics_storage"]),
    (
        "marketing",
        &["ad_storage", "ad_user_data", "ad_personalization"],
    ),
];

/// Category → raw value (`"allow"`, `"deny"`) as reported by the consent source.
pub type ConsentChanges = BTreeMap<String, String>;

pub type ConsentHandler = Box<dyn Fn(&ConsentChanges) + Send + Sync>;

/// Change notifications from a consent management platform.
pub trait ConsentSource {
    fn listen(&mut self, handler: ConsentHandler);
}

/// Flags controlled by `category`; empty for categories gtag does not know.
#[must_use]
pub fn flags_for(category: &str) -> &'static [&'static str] {
    CONSENT_MAP
        .iter()
        .find(|(c, _)| *c == category)
        .map(|(_, flags)| *flags)
        .unwrap_or_default()
}

/// `allow` grants, anything else denies.
#[must_use]
pub fn consent_value(raw: &str) -> ConsentValue {
    if raw.trim().eq_ignore_ascii_case("allow") {
        ConsentValue::Granted
    } else {
        ConsentValue::Denied
    }
}

/// Translate category changes into consent flags. Unknown categories are
/// dropped.
#[must_use]
pub fn translate(changes: &ConsentChanges) -> Payload {
    let mut params = Payload::new();
    for (category, raw) in changes {
        let value = consent_value(raw);
        for flag in flags_for(category) {
            params.insert((*flag).to_string(), Value::from(value.as_str()));
        }
    }
    params
}

/// `gtag('consent', 'update', ...)` for `changes`, or `None` when nothing maps.
#[must_use]
pub fn update_command(changes: &ConsentChanges) -> Option<TagCommand> {
    let params = translate(changes);
    if params.is_empty() {
        return None;
    }
    Some(TagCommand::Consent {
        mode: ConsentMode::Update,
        params,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    NotSubscribed,
    Subscribed,
}

/// Forwards consent changes to the reporting sink as they arrive.
#[derive(Clone)]
pub struct ConsentBridge {
    sink: Option<Arc<dyn TagSink>>,
    state: SubscriptionState,
}

impl fmt::Debug for ConsentBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsentBridge")
            .field("has_sink", &self.sink.is_some())
            .field("state", &self.state)
            .finish()
    }
}

impl ConsentBridge {
    #[must_use]
    pub fn new(sink: Option<Arc<dyn TagSink>>) -> Self {
        Self {
            sink,
            state: SubscriptionState::NotSubscribed,
        }
    }

    #[must_use]
    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    /// Register a single listener on `source`. Without a source, or when
    /// already subscribed, nothing happens.
    pub fn attach(&mut self, source: Option<&mut dyn ConsentSource>) -> SubscriptionState {
        if self.state == SubscriptionState::Subscribed {
            return self.state;
        }
        let Some(source) = source else {
            debug!("no consent source, consent updates disabled");
            return self.state;
        };
        let bridge = self.clone();
        source.listen(Box::new(move |changes: &ConsentChanges| {
            bridge.on_change(changes);
        }));
        self.state = SubscriptionState::Subscribed;
        self.state
    }

    /// Translate and forward `changes`; `true` when an update was sent.
    pub fn on_change(&self, changes: &ConsentChanges) -> bool {
        let Some(command) = update_command(changes) else {
            debug!(?changes, "no consent flags affected");
            return false;
        };
        let Some(sink) = &self.sink else {
            debug!("no reporting sink, consent update dropped");
            return false;
        };
        match sink.send(command) {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "consent update dropped");
                false
            }
        }
    }
}
