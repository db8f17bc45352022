//! Event name → formatter map.
//!
//! Registration is last-write-wins: registering a name again drops the old
//! formatter before inserting the new one, so integrations and tests can
//! override the built-in shaping. A strict registry refuses duplicates
//! instead, which catches accidental double registration in tests.

use crate::error::{DispatchError, FormatError, Result};
use crate::formatters;
use gtagcart_core::{EventContext, Payload, ProductIdentifier};
use std::collections::HashMap;
use std::fmt;

/// `Ok(None)` suppresses the event.
pub type FormatResult = std::result::Result<Option<Payload>, FormatError>;

/// Shapes a storefront context into an event payload.
pub trait Formatter: Send + Sync {
    fn format(&self, ctx: &EventContext) -> FormatResult;
}

impl<F> Formatter for F
where
    F: Fn(&EventContext) -> FormatResult + Send + Sync,
{
    fn format(&self, ctx: &EventContext) -> FormatResult {
        self(ctx)
    }
}

#[derive(Default)]
pub struct FormatterRegistry {
    formatters: HashMap<String, Box<dyn Formatter>>,
    strict: bool,
}

impl fmt::Debug for FormatterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatterRegistry")
            .field("events", &self.names())
            .field("strict", &self.strict)
            .finish()
    }
}

impl FormatterRegistry {
    /// Empty, last-write-wins registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty registry that rejects duplicate names.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            formatters: HashMap::new(),
            strict: true,
        }
    }

    /// The GA4 event catalog with `item_id` taken per `identifier`.
    #[must_use]
    pub fn ga4(identifier: ProductIdentifier) -> Self {
        let mut registry = Self::new();
        registry.insert(formatters::ADD_TO_CART, move |ctx: &EventContext| {
            formatters::cart_item(ctx, identifier)
        });
        registry.insert(formatters::REMOVE_FROM_CART, move |ctx: &EventContext| {
            formatters::cart_item(ctx, identifier)
        });
        registry.insert(formatters::BEGIN_CHECKOUT, move |ctx: &EventContext| {
            formatters::begin_checkout(ctx, identifier)
        });
        registry.insert(formatters::ADD_SHIPPING_INFO, move |ctx: &EventContext| {
            formatters::add_shipping_info(ctx, identifier)
        });
        registry.insert(formatters::VIEW_ITEM_LIST, move |ctx: &EventContext| {
            formatters::view_item_list(ctx, identifier)
        });
        registry.insert(formatters::VIEW_ITEM, move |ctx: &EventContext| {
            formatters::view_item(ctx, identifier)
        });
        registry.insert(formatters::SELECT_CONTENT, move |ctx: &EventContext| {
            formatters::select_content(ctx, identifier)
        });
        registry.insert(formatters::SEARCH, formatters::search);
        registry.insert(formatters::EXCEPTION, formatters::exception);
        registry.insert(formatters::PURCHASE, move |ctx: &EventContext| {
            formatters::purchase(ctx, identifier)
        });
        registry
    }

    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Store `formatter` under `name`, replacing any previous entry.
    ///
    /// Fails only on a strict registry that already knows `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, formatter: F) -> Result<()>
    where
        F: Formatter + 'static,
    {
        let name = name.into();
        if self.strict && self.formatters.contains_key(&name) {
            return Err(DispatchError::DuplicateFormatter(name));
        }
        self.insert(name, formatter);
        Ok(())
    }

    fn insert<F>(&mut self, name: impl Into<String>, formatter: F)
    where
        F: Formatter + 'static,
    {
        let name = name.into();
        self.formatters.remove(&name);
        self.formatters.insert(name, Box::new(formatter));
    }

    /// Drop the formatter for `name`; `true` if one was registered.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.formatters.remove(name).is_some()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn Formatter> {
        self.formatters.get(name).map(|f| &**f)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.formatters.contains_key(name)
    }

    /// Registered event names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.formatters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.formatters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.formatters.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn constant(tag: &'static str) -> impl Fn(&EventContext) -> FormatResult + Send + Sync {
        move |_ctx: &EventContext| {
            let mut payload = Payload::new();
            payload.insert("tag".into(), json!(tag));
            Ok(Some(payload))
        }
    }

    #[test]
    fn ga4_registers_full_catalog() {
        let registry = FormatterRegistry::ga4(ProductIdentifier::ProductSku);
        assert_eq!(
            registry.names(),
            vec![
                "add_shipping_info",
                "add_to_cart",
                "begin_checkout",
                "exception",
                "purchase",
                "remove_from_cart",
                "search",
                "select_content",
                "view_item",
                "view_item_list",
            ]
        );
        assert!(!registry.is_strict());
    }

    #[test]
    fn reregistering_replaces_formatter() {
        let mut registry = FormatterRegistry::new();
        registry.register("custom", constant("first")).unwrap();
        registry.register("custom", constant("second")).unwrap();

        assert_eq!(registry.len(), 1);
        let payload = registry
            .get("custom")
            .expect("formatter registered")
            .format(&EventContext::default())
            .unwrap()
            .unwrap();
        assert_eq!(payload["tag"], json!("second"));
    }

    #[test]
    fn strict_registry_rejects_duplicates() {
        let mut registry = FormatterRegistry::strict();
        registry.register("custom", constant("first")).unwrap();
        assert_eq!(
            registry.register("custom", constant("second")),
            Err(DispatchError::DuplicateFormatter("custom".into()))
        );

        let payload = registry
            .get("custom")
            .expect("formatter registered")
            .format(&EventContext::default())
            .unwrap()
            .unwrap();
        assert_eq!(payload["tag"], json!("first"));
    }

    #[test]
    fn unregister_removes_entry() {
        let mut registry = FormatterRegistry::ga4(ProductIdentifier::ProductId);
        assert!(registry.unregister("search"));
        assert!(!registry.unregister("search"));
        assert!(!registry.contains("search"));
        assert!(registry.get("search").is_none());
    }
}
