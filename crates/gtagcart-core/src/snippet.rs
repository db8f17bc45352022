//! Page bootstrap: the inline script that defines `gtag`, sets consent
//! defaults and configures the measurement id before any event is sent.

use crate::settings::TrackingSettings;
use crate::sink::TagCommand;
use crate::Payload;
use serde_json::{json, Value};
use thiserror::Error;

/// Developer id the tag library attributes the integration to.
pub const DEVELOPER_ID: &str = "developer_id.dOGY3NW";

const DATA_LAYER_PRELUDE: &str =
    "window.dataLayer = window.dataLayer || [];\nfunction gtag(){dataLayer.push(arguments);}";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SnippetError {
    #[error("tracking id is not configured")]
    MissingTrackingId,
}

/// Commands that must run before the first event, in order.
pub fn bootstrap_commands(settings: &TrackingSettings) -> Result<Vec<TagCommand>, SnippetError> {
    let tracking_id = settings.tracking_id.trim();
    if tracking_id.is_empty() {
        return Err(SnippetError::MissingTrackingId);
    }

    Ok(vec![
        settings.consent.to_command(),
        TagCommand::Js,
        TagCommand::Set {
            key: DEVELOPER_ID.to_string(),
            value: Value::Bool(true),
        },
        TagCommand::Config {
            tracking_id: tracking_id.to_string(),
            params: config_params(settings),
        },
    ])
}

fn config_params(settings: &TrackingSettings) -> Payload {
    let mut params = Payload::new();
    params.insert("anonymize_ip".into(), Value::Bool(settings.anonymize_ip));
    params.insert(
        "allow_google_signals".into(),
        Value::Bool(settings.google_signals),
    );
    params.insert(
        "link_attribution".into(),
        Value::Bool(settings.link_attribution),
    );
    params.insert("track_404".into(), Value::Bool(settings.track_404));
    if !settings.linker_domains.is_empty() {
        params.insert(
            "linker".into(),
            json!({
                "domains": settings.linker_domains,
                "allow_incoming": settings.linker_allow_incoming,
            }),
        );
    }
    params
}

/// Render the inline script body for the given commands.
#[must_use]
pub fn render_snippet(commands: &[TagCommand]) -> String {
    let mut out = String::from(DATA_LAYER_PRELUDE);
    for command in commands {
        out.push('\n');
        out.push_str(&command.to_js());
    }
    out.push('\n');
    out
}
