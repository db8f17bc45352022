//! Turns a named event plus context into a `gtag('event', ...)` call.

use crate::error::{DispatchError, Result};
use crate::registry::{Formatter, FormatterRegistry};
use gtagcart_core::{EventContext, SinkError, TagCommand, TagSink, TrackingSettings};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// What happened to a dispatched event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Handed to the sink.
    Sent,
    /// The formatter found nothing to report.
    Suppressed,
    /// The event is switched off in the site settings.
    Disabled,
}

/// Routes events through their formatter into the reporting sink.
///
/// The dispatcher owns no global state: the sink is injected, and without
/// one every reportable event fails with [`DispatchError::SinkUnavailable`].
pub struct Dispatcher {
    registry: FormatterRegistry,
    sink: Option<Arc<dyn TagSink>>,
    enabled: Option<HashSet<String>>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("has_sink", &self.sink.is_some())
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl Dispatcher {
    /// Dispatcher with every registered event enabled and no sink.
    #[must_use]
    pub fn new(registry: FormatterRegistry) -> Self {
        Self {
            registry,
            sink: None,
            enabled: None,
        }
    }

    /// GA4 catalog restricted to the events the site has switched on.
    #[must_use]
    pub fn from_settings(settings: &TrackingSettings) -> Self {
        Self::new(FormatterRegistry::ga4(settings.product_identifier))
            .with_enabled_events(settings.events.iter().cloned())
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn TagSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Only these events are emitted; other registered events report
    /// [`Outcome::Disabled`].
    #[must_use]
    pub fn with_enabled_events<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enabled = Some(events.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn registry(&self) -> &FormatterRegistry {
        &self.registry
    }

    /// Register or replace a formatter; see [`FormatterRegistry::register`].
    pub fn register<F>(&mut self, name: impl Into<String>, formatter: F) -> Result<()>
    where
        F: Formatter + 'static,
    {
        self.registry.register(name, formatter)
    }

    #[must_use]
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled
            .as_ref()
            .map_or(true, |enabled| enabled.contains(name))
    }

    /// Format and emit `name`. Errors are returned to the caller; use
    /// [`Dispatcher::track`] where a failure must not escape.
    pub fn dispatch(&self, name: &str, ctx: &EventContext) -> Result<Outcome> {
        let formatter = self
            .registry
            .get(name)
            .ok_or_else(|| DispatchError::NotSupported(name.to_string()))?;

        if !self.is_enabled(name) {
            debug!(event = name, "event disabled, skipping");
            return Ok(Outcome::Disabled);
        }

        let payload = formatter
            .format(ctx)
            .map_err(|source| DispatchError::Format {
                event: name.to_string(),
                source,
            })?;
        let Some(payload) = payload else {
            debug!(event = name, "nothing to report");
            return Ok(Outcome::Suppressed);
        };

        let sink = self.sink.as_ref().ok_or(DispatchError::SinkUnavailable)?;
        sink.send(TagCommand::event(name, payload))
            .map_err(|source| match source {
                SinkError::Unavailable => DispatchError::SinkUnavailable,
                other => DispatchError::Sink {
                    event: name.to_string(),
                    source: other,
                },
            })?;

        debug!(event = name, "event sent");
        Ok(Outcome::Sent)
    }

    /// Fire-and-forget variant of [`Dispatcher::dispatch`]: failures are
    /// logged and the event is dropped.
    pub fn track(&self, name: &str, ctx: &EventContext) -> Option<Outcome> {
        match self.dispatch(name, ctx) {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                warn!(event = name, error = %err, "dropping analytics event");
                None
            }
        }
    }
}
