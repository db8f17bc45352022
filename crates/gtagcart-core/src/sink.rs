//! Reporting sinks: where formatted tag commands go.
//!
//! A [`TagCommand`] is one `gtag(...)` call. Sinks receive commands one at a
//! time and either accept them or fail; there is no retry and no buffering
//! beyond what a sink does on its own. [`TagQueue`] is the in-process
//! equivalent of the page's `dataLayer`.

use crate::Payload;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Fallback timestamp when formatting fails
const FALLBACK_TIMESTAMP: &str = "1970-01-01T00:00:00Z";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The sink has not been set up (no `dataLayer`, no endpoint).
    #[error("reporting sink is not initialized")]
    Unavailable,
    #[error("transport failed: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentMode {
    Default,
    Update,
}

impl ConsentMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ConsentMode::Default => "default",
            ConsentMode::Update => "update",
        }
    }
}

/// A single `gtag(...)` invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum TagCommand {
    /// `gtag('js', new Date())`
    Js,
    /// `gtag('set', key, value)`
    Set { key: String, value: Value },
    /// `gtag('config', tracking_id, params)`
    Config { tracking_id: String, params: Payload },
    /// `gtag('consent', mode, params)`
    Consent { mode: ConsentMode, params: Payload },
    /// `gtag('event', name, payload)`
    Event { name: String, payload: Payload },
}

impl TagCommand {
    #[must_use]
    pub fn event(name: impl Into<String>, payload: Payload) -> Self {
        TagCommand::Event {
            name: name.into(),
            payload,
        }
    }

    /// Event name for `Event` commands.
    #[must_use]
    pub fn event_name(&self) -> Option<&str> {
        match self {
            TagCommand::Event { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Positional `gtag` arguments as JSON values. `Js` carries no date here;
    /// the page supplies `new Date()` when rendering.
    #[must_use]
    pub fn to_args(&self) -> Vec<Value> {
        match self {
            TagCommand::Js => vec![Value::from("js")],
            TagCommand::Set { key, value } => {
                vec![Value::from("set"), Value::from(key.as_str()), value.clone()]
            }
            TagCommand::Config { tracking_id, params } => vec![
                Value::from("config"),
                Value::from(tracking_id.as_str()),
                Value::Object(params.clone()),
            ],
            TagCommand::Consent { mode, params } => vec![
                Value::from("consent"),
                Value::from(mode.as_str()),
                Value::Object(params.clone()),
            ],
            TagCommand::Event { name, payload } => vec![
                Value::from("event"),
                Value::from(name.as_str()),
                Value::Object(payload.clone()),
            ],
        }
    }

    /// JavaScript statement for this command, e.g.
    /// `gtag("event", "search", {"search_term":"hat"});`.
    ///
    /// The output is safe inside an inline `<script>` element: `<`, `>` and
    /// `&` only occur in JSON strings and are written as `\u` escapes there.
    #[must_use]
    pub fn to_js(&self) -> String {
        if matches!(self, TagCommand::Js) {
            return r#"gtag("js", new Date());"#.to_string();
        }
        let args: Vec<String> = self
            .to_args()
            .iter()
            .map(|arg| script_safe(&arg.to_string()))
            .collect();
        format!("gtag({});", args.join(", "))
    }
}

fn script_safe(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            c => out.push(c),
        }
    }
    out
}

/// Destination for tag commands.
///
/// Implementations must be shareable across the dispatcher and the consent
/// bridge, hence `&self` and `Send + Sync`.
pub trait TagSink: Send + Sync {
    fn send(&self, command: TagCommand) -> Result<(), SinkError>;
}

impl<S> TagSink for Arc<S>
where
    S: TagSink + ?Sized,
{
    fn send(&self, command: TagCommand) -> Result<(), SinkError> {
        (**self).send(command)
    }
}

/// A command as recorded by [`TagQueue`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedCommand {
    /// RFC 3339 time the command was accepted.
    pub ts: String,
    #[serde(flatten)]
    pub command: TagCommand,
}

#[derive(Debug, Default)]
struct QueueState {
    installed: bool,
    entries: Vec<QueuedCommand>,
}

/// Ordered in-memory log of tag commands.
///
/// Rejects commands with [`SinkError::Unavailable`] until [`TagQueue::install`]
/// has been called, mirroring a page where the tag library never loaded.
#[derive(Debug, Default)]
pub struct TagQueue {
    state: Mutex<QueueState>,
}

impl TagQueue {
    /// A queue that is not yet installed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A queue that accepts commands right away.
    #[must_use]
    pub fn installed() -> Self {
        let queue = Self::new();
        queue.install();
        queue
    }

    pub fn install(&self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .installed = true;
    }

    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .installed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of everything recorded so far, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<QueuedCommand> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .clone()
    }

    /// Take everything recorded so far, oldest first.
    pub fn drain(&self) -> Vec<QueuedCommand> {
        std::mem::take(
            &mut self
                .state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entries,
        )
    }
}

impl TagSink for TagQueue {
    fn send(&self, command: TagCommand) -> Result<(), SinkError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| SinkError::Transport("tag queue lock poisoned".into()))?;
        if !state.installed {
            return Err(SinkError::Unavailable);
        }
        state.entries.push(QueuedCommand {
            ts: iso8601_now(),
            command,
        });
        Ok(())
    }
}

fn iso8601_now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| FALLBACK_TIMESTAMP.to_string())
}
