//! Storefront signals as they arrive from the host environment.
//!
//! A [`StoreSignal`] names a lifecycle notification (`cart-add-item`,
//! `product-list-render`, ...) and carries the [`EventContext`] the
//! storefront attached to it. The CLI reads them one per line from JSONL.

use crate::EventContext;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreSignal {
    /// Signal name as emitted by the storefront.
    pub signal: String,
    /// Data the storefront attached; absent means an empty context.
    #[serde(default)]
    pub context: EventContext,
    /// Component that raised the signal, e.g. `"cart-block"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// RFC 3339 time the signal was raised.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
}

impl StoreSignal {
    #[must_use]
    pub fn new(signal: impl Into<String>, context: EventContext) -> Self {
        Self {
            signal: signal.into(),
            context,
            source: None,
            ts: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn store_signal_from_json_line() {
        let line = r#"{"signal":"product-search","context":{"search_term":"wool hat"},"ts":"2024-03-01T10:00:00Z"}"#;
        let signal: StoreSignal = serde_json::from_str(line).expect("signal should parse");
        assert_eq!(signal.signal, "product-search");
        assert_eq!(signal.context.search_term.as_deref(), Some("wool hat"));
        assert_eq!(signal.ts.as_deref(), Some("2024-03-01T10:00:00Z"));
        assert!(signal.source.is_none());
    }

    #[test]
    fn store_signal_without_context_gets_empty_one() {
        let signal: StoreSignal =
            serde_json::from_value(json!({"signal": "checkout-render-checkout-form"}))
                .expect("signal should parse");
        assert_eq!(signal.context, EventContext::default());
    }

    #[test]
    fn store_signal_skips_unset_fields_when_serialized() {
        let serialized = serde_json::to_string(&StoreSignal::new("cart-add-item", EventContext::default()))
            .expect("serializes");
        assert!(!serialized.contains("\"source\""));
        assert!(!serialized.contains("\"ts\""));
    }
}
