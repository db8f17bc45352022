//! Inbound storefront signals and how they reach the dispatcher.
//!
//! The host environment owns delivery (action hooks, DOM events, a message
//! bus). All the dispatcher needs is something that implements
//! [`SignalSource`]; [`wire`] subscribes one handler per mapped signal.

use crate::dispatch::Dispatcher;
use crate::formatters;
use gtagcart_core::event::StoreSignal;
use gtagcart_core::EventContext;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub type SignalHandler = Box<dyn Fn(&EventContext) + Send + Sync>;

/// Pub/sub capability provided by the host environment.
pub trait SignalSource {
    fn subscribe(&mut self, signal: &str, handler: SignalHandler);
}

/// Signal name → event name. Each signal maps to exactly one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalMap {
    routes: BTreeMap<String, String>,
}

impl Default for SignalMap {
    /// Storefront block actions.
    fn default() -> Self {
        let mut map = Self::empty();
        for (signal, event) in [
            ("cart-add-item", formatters::ADD_TO_CART),
            ("cart-remove-item", formatters::REMOVE_FROM_CART),
            ("checkout-render-checkout-form", formatters::BEGIN_CHECKOUT),
            (
                "checkout-set-selected-shipping-rate",
                formatters::ADD_SHIPPING_INFO,
            ),
            ("product-list-render", formatters::VIEW_ITEM_LIST),
            ("product-render", formatters::VIEW_ITEM),
            ("product-view-link", formatters::SELECT_CONTENT),
            ("product-search", formatters::SEARCH),
            ("store-notice-create", formatters::EXCEPTION),
            ("order-received", formatters::PURCHASE),
        ] {
            map.route(signal, event);
        }
        map
    }
}

impl SignalMap {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            routes: BTreeMap::new(),
        }
    }

    /// Route `signal` to `event`, replacing an existing route.
    pub fn route(&mut self, signal: impl Into<String>, event: impl Into<String>) -> &mut Self {
        self.routes.insert(signal.into(), event.into());
        self
    }

    #[must_use]
    pub fn event_for(&self, signal: &str) -> Option<&str> {
        self.routes.get(signal).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.routes.iter().map(|(s, e)| (s.as_str(), e.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Subscribe the dispatcher to every signal in `map`. Returns the number of
/// subscriptions made.
pub fn wire<S>(dispatcher: &Arc<Dispatcher>, source: &mut S, map: &SignalMap) -> usize
where
    S: SignalSource + ?Sized,
{
    let mut count = 0;
    for (signal, event) in map.iter() {
        let dispatcher = Arc::clone(dispatcher);
        let event = event.to_string();
        source.subscribe(
            signal,
            Box::new(move |ctx: &EventContext| {
                dispatcher.track(&event, ctx);
            }),
        );
        count += 1;
    }
    count
}

/// In-process signal source: handlers run synchronously, in subscription
/// order, on [`SignalHub::emit`].
#[derive(Default)]
pub struct SignalHub {
    handlers: HashMap<String, Vec<SignalHandler>>,
}

impl fmt::Debug for SignalHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: BTreeMap<&str, usize> = self
            .handlers
            .iter()
            .map(|(signal, handlers)| (signal.as_str(), handlers.len()))
            .collect();
        f.debug_struct("SignalHub").field("handlers", &counts).finish()
    }
}

impl SignalHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every handler subscribed to `signal`; returns how many ran.
    pub fn emit(&self, signal: &str, ctx: &EventContext) -> usize {
        let Some(handlers) = self.handlers.get(signal) else {
            debug!(signal, "no subscribers");
            return 0;
        };
        for handler in handlers {
            handler(ctx);
        }
        handlers.len()
    }

    pub fn emit_signal(&self, signal: &StoreSignal) -> usize {
        self.emit(&signal.signal, &signal.context)
    }
}

impl SignalSource for SignalHub {
    fn subscribe(&mut self, signal: &str, handler: SignalHandler) {
        self.handlers
            .entry(signal.to_string())
            .or_default()
            .push(handler);
    }
}
