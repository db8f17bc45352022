//! Site-level tracking settings, already resolved from the store's admin
//! options. Every field has a default so a partial JSON file is enough.

use crate::catalog::ProductIdentifier;
use crate::sink::{ConsentMode, TagCommand};
use crate::Payload;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event names enabled out of the box.
pub const DEFAULT_EVENTS: &[&str] = &[
    "purchase",
    "add_to_cart",
    "remove_from_cart",
    "view_item_list",
    "select_content",
    "view_item",
    "begin_checkout",
    "add_shipping_info",
    "search",
    "exception",
];

/// Regions where consent defaults to denied: EEA, UK and Switzerland.
pub const DEFAULT_CONSENT_REGIONS: &[&str] = &[
    "AT", "BE", "BG", "HR", "CY", "CZ", "DK", "EE", "FI", "FR", "DE", "GR", "HU", "IS", "IE",
    "IT", "LV", "LI", "LT", "LU", "MT", "NL", "NO", "PL", "PT", "RO", "SK", "SI", "ES", "SE",
    "GB", "CH",
];

/// Value of a single gtag consent flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentValue {
    Granted,
    #[default]
    Denied,
}

impl ConsentValue {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ConsentValue::Granted => "granted",
            ConsentValue::Denied => "denied",
        }
    }
}

/// Parameters of the `gtag('consent', 'default', ...)` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsentDefaults {
    pub analytics_storage: ConsentValue,
    pub ad_storage: ConsentValue,
    pub ad_user_data: ConsentValue,
    pub ad_personalization: ConsentValue,
    /// ISO 3166 region codes the defaults apply to; empty means everywhere.
    pub region: Vec<String>,
    /// Milliseconds gtag waits for a consent update before sending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_for_update: Option<u32>,
}

impl Default for ConsentDefaults {
    fn default() -> Self {
        Self {
            analytics_storage: ConsentValue::Denied,
            ad_storage: ConsentValue::Denied,
            ad_user_data: ConsentValue::Denied,
            ad_personalization: ConsentValue::Denied,
            region: DEFAULT_CONSENT_REGIONS
                .iter()
                .map(|r| (*r).to_string())
                .collect(),
            wait_for_update: None,
        }
    }
}

impl ConsentDefaults {
    /// Flat parameter object for the consent default command.
    #[must_use]
    pub fn to_params(&self) -> Payload {
        let mut params = Payload::new();
        for (flag, value) in [
            ("analytics_storage", self.analytics_storage),
            ("ad_storage", self.ad_storage),
            ("ad_user_data", self.ad_user_data),
            ("ad_personalization", self.ad_personalization),
        ] {
            params.insert(flag.to_string(), Value::from(value.as_str()));
        }
        if !self.region.is_empty() {
            params.insert("region".to_string(), Value::from(self.region.clone()));
        }
        if let Some(ms) = self.wait_for_update {
            params.insert("wait_for_update".to_string(), Value::from(ms));
        }
        params
    }

    /// `gtag('consent', 'default', ...)` for these defaults.
    #[must_use]
    pub fn to_command(&self) -> TagCommand {
        TagCommand::Consent {
            mode: ConsentMode::Default,
            params: self.to_params(),
        }
    }
}

/// Resolved tracking configuration for one site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingSettings {
    /// GA4 measurement id, e.g. `G-XXXXXXX`.
    pub tracking_id: String,
    pub product_identifier: ProductIdentifier,
    /// Event names that may be emitted; anything else is dropped quietly.
    pub events: Vec<String>,
    pub anonymize_ip: bool,
    pub google_signals: bool,
    pub link_attribution: bool,
    pub track_404: bool,
    pub linker_domains: Vec<String>,
    pub linker_allow_incoming: bool,
    pub consent: ConsentDefaults,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            tracking_id: String::new(),
            product_identifier: ProductIdentifier::default(),
            events: DEFAULT_EVENTS.iter().map(|e| (*e).to_string()).collect(),
            anonymize_ip: true,
            google_signals: false,
            link_attribution: false,
            track_404: true,
            linker_domains: Vec::new(),
            linker_allow_incoming: false,
            consent: ConsentDefaults::default(),
        }
    }
}
