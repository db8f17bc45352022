//! CLI for gtagcart.
//!
//! Renders the page bootstrap snippet, replays storefront signals through the
//! GA4 dispatcher and translates consent changes. Replayed events are printed
//! as `gtag(...)` calls or, with `--send`, posted to the GA4 Measurement
//! Protocol endpoint one request per event.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use gtagcart_consent::{update_command, ConsentChanges};
use gtagcart_core::event::StoreSignal;
use gtagcart_core::sink::QueuedCommand;
use gtagcart_core::snippet::{bootstrap_commands, render_snippet};
use gtagcart_core::{SinkError, TagCommand, TagQueue, TagSink, TrackingSettings};
use gtagcart_events::{wire, Dispatcher, SignalHub, SignalMap};
use serde_json::json;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_COLLECT_URL: &str = "https://www.google-analytics.com/mp/collect";
const GTAG_LOADER_URL: &str = "https://www.googletagmanager.com/gtag/js";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the inline bootstrap snippet for a page
    Snippet {
        /// Path to the tracking settings (JSON)
        #[arg(long)]
        settings: Option<PathBuf>,

        /// Measurement id, overrides the settings file
        #[arg(long, env = "GTAGCART_MEASUREMENT_ID")]
        measurement_id: Option<String>,

        /// Wrap the snippet in <script> tags, including the gtag.js loader
        #[arg(long)]
        wrap: bool,
    },
    /// Replay storefront signals (JSONL) through the dispatcher
    Track {
        /// Path to the tracking settings (JSON)
        #[arg(long)]
        settings: Option<PathBuf>,

        /// Measurement id, overrides the settings file
        #[arg(long, env = "GTAGCART_MEASUREMENT_ID")]
        measurement_id: Option<String>,

        /// Input file; reads stdin when omitted
        #[arg(long)]
        input: Option<PathBuf>,

        /// Output format for emitted commands
        #[arg(long, value_enum, default_value_t = OutputFormat::Js)]
        format: OutputFormat,

        /// Send events to the Measurement Protocol endpoint instead of printing
        #[arg(long)]
        send: bool,

        /// Measurement Protocol API secret (required with --send)
        #[arg(long, env = "GTAGCART_API_SECRET", hide_env_values = true)]
        api_secret: Option<String>,

        /// Measurement Protocol endpoint
        #[arg(long, env = "GTAGCART_COLLECT_URL", default_value = DEFAULT_COLLECT_URL)]
        collect_url: String,

        /// Client id reported with sent events
        #[arg(long, default_value = "555.1")]
        client_id: String,
    },
    /// Translate consent changes into a consent update command
    Consent {
        /// Category → value map, e.g. '{"statistics":"allow"}'
        #[arg(long)]
        changes: String,

        /// Output format for the command
        #[arg(long, value_enum, default_value_t = OutputFormat::Js)]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// `gtag(...)` statements
    Js,
    /// JSON argument arrays, one per line
    Json,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false);
    // Subsequent initialisation attempts are no-ops.
    if json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}

fn load_settings(path: Option<&Path>, measurement_id: Option<String>) -> Result<TrackingSettings> {
    let mut settings = match path {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open settings file {}", path.display()))?;
            serde_json::from_reader(file)
                .with_context(|| format!("Invalid settings file {}", path.display()))?
        }
        None => TrackingSettings::default(),
    };
    if let Some(id) = measurement_id.filter(|id| !id.trim().is_empty()) {
        settings.tracking_id = id;
    }
    Ok(settings)
}

fn render_command(command: &TagCommand, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Js => command.to_js(),
        OutputFormat::Json => serde_json::to_string(&command.to_args())?,
    })
}

/// Posts each event to the GA4 Measurement Protocol. Non-event commands have
/// no Measurement Protocol equivalent and are skipped.
struct MeasurementProtocolSink {
    client: reqwest::blocking::Client,
    endpoint: String,
    measurement_id: String,
    api_secret: String,
    client_id: String,
}

impl MeasurementProtocolSink {
    fn new(endpoint: &str, measurement_id: &str, api_secret: &str, client_id: &str) -> Result<Self> {
        let endpoint = reqwest::Url::parse(endpoint).context("Invalid collect URL")?;
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            measurement_id: measurement_id.to_string(),
            api_secret: api_secret.to_string(),
            client_id: client_id.to_string(),
        })
    }
}

impl TagSink for MeasurementProtocolSink {
    fn send(&self, command: TagCommand) -> std::result::Result<(), SinkError> {
        let TagCommand::Event { name, payload } = command else {
            debug!("skipping non-event command for measurement protocol");
            return Ok(());
        };
        let body = json!({
            "client_id": self.client_id,
            "events": [{ "name": name, "params": payload }],
        });
        self.client
            .post(&self.endpoint)
            .query(&[
                ("measurement_id", self.measurement_id.as_str()),
                ("api_secret", self.api_secret.as_str()),
            ])
            .json(&body)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        debug!(event = %name, "event posted");
        Ok(())
    }
}

/// Counts events the wrapped sink accepted, whichever sink that is.
struct CountingSink {
    inner: Arc<dyn TagSink>,
    sent: AtomicU64,
}

impl CountingSink {
    fn new(inner: Arc<dyn TagSink>) -> Self {
        Self {
            inner,
            sent: AtomicU64::new(0),
        }
    }

    fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

impl TagSink for CountingSink {
    fn send(&self, command: TagCommand) -> std::result::Result<(), SinkError> {
        let is_event = command.event_name().is_some();
        self.inner.send(command)?;
        if is_event {
            self.sent.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ReplaySummary {
    signals: u64,
    unrouted: u64,
    malformed: u64,
    /// Events the dispatcher's sink accepted.
    emitted: u64,
}

/// Feed every JSONL signal into the hub and write whatever lands in `queue`.
/// `counter` must be the sink the hub's dispatcher sends to. Malformed lines
/// are logged and skipped.
fn replay(
    reader: impl BufRead,
    hub: &SignalHub,
    queue: &TagQueue,
    counter: &CountingSink,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();

    for (idx, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read input")?;
        if line.trim().is_empty() {
            continue;
        }
        let signal: StoreSignal = match serde_json::from_str(&line) {
            Ok(signal) => signal,
            Err(e) => {
                warn!(line = idx + 1, error = %e, "skipping malformed signal");
                summary.malformed += 1;
                continue;
            }
        };
        summary.signals += 1;
        if hub.emit_signal(&signal) == 0 {
            warn!(line = idx + 1, signal = %signal.signal, "no event mapped to signal");
            summary.unrouted += 1;
        }

        for QueuedCommand { command, .. } in queue.drain() {
            writeln!(out, "{}", render_command(&command, format)?)?;
        }
    }

    summary.emitted = counter.sent();
    Ok(summary)
}

#[allow(clippy::too_many_arguments)]
fn run_track(
    settings: Option<&Path>,
    measurement_id: Option<String>,
    input: Option<&Path>,
    format: OutputFormat,
    send: bool,
    api_secret: Option<&str>,
    collect_url: &str,
    client_id: &str,
) -> Result<()> {
    let settings = load_settings(settings, measurement_id)?;

    let queue = Arc::new(TagQueue::installed());
    let sink: Arc<dyn TagSink> = if send {
        if settings.tracking_id.trim().is_empty() {
            anyhow::bail!("--send requires a measurement id (settings or GTAGCART_MEASUREMENT_ID)");
        }
        let api_secret = api_secret
            .filter(|s| !s.is_empty())
            .context("--send requires GTAGCART_API_SECRET or --api-secret")?;
        Arc::new(MeasurementProtocolSink::new(
            collect_url,
            &settings.tracking_id,
            api_secret,
            client_id,
        )?)
    } else {
        queue.clone()
    };

    let counter = Arc::new(CountingSink::new(sink));
    let dispatcher = Arc::new(Dispatcher::from_settings(&settings).with_sink(counter.clone()));
    let mut hub = SignalHub::new();
    wire(&dispatcher, &mut hub, &SignalMap::default());

    let reader: Box<dyn BufRead> = match input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open input {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let summary = replay(reader, &hub, &queue, &counter, format, &mut out)?;
    out.flush()?;

    info!(
        signals = summary.signals,
        unrouted = summary.unrouted,
        malformed = summary.malformed,
        emitted = summary.emitted,
        "replay finished"
    );
    Ok(())
}

/// Async `gtag.js` loader element; the id is percent-encoded into the URL.
fn loader_tag(tracking_id: &str) -> Result<String> {
    let src = reqwest::Url::parse_with_params(GTAG_LOADER_URL, &[("id", tracking_id)])
        .context("Invalid loader URL")?;
    Ok(format!("<script async src=\"{src}\"></script>"))
}

fn run_snippet(settings: Option<&Path>, measurement_id: Option<String>, wrap: bool) -> Result<()> {
    let settings = load_settings(settings, measurement_id)?;
    let commands = bootstrap_commands(&settings).context("Cannot render snippet")?;
    let script = render_snippet(&commands);
    if wrap {
        println!("{}", loader_tag(settings.tracking_id.trim())?);
        print!("<script>\n{script}</script>\n");
    } else {
        print!("{script}");
    }
    Ok(())
}

fn run_consent(changes: &str, format: OutputFormat) -> Result<()> {
    let changes: ConsentChanges =
        serde_json::from_str(changes).context("--changes must be a JSON object of strings")?;
    match update_command(&changes) {
        Some(command) => println!("{}", render_command(&command, format)?),
        None => warn!("no consent flags affected"),
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Snippet {
            settings,
            measurement_id,
            wrap,
        } => run_snippet(settings.as_deref(), measurement_id, wrap),
        Commands::Track {
            settings,
            measurement_id,
            input,
            format,
            send,
            api_secret,
            collect_url,
            client_id,
        } => run_track(
            settings.as_deref(),
            measurement_id,
            input.as_deref(),
            format,
            send,
            api_secret.as_deref(),
            &collect_url,
            &client_id,
        ),
        Commands::Consent { changes, format } => run_consent(&changes, format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct Discard;

    impl TagSink for Discard {
        fn send(&self, _command: TagCommand) -> std::result::Result<(), SinkError> {
            Ok(())
        }
    }

    fn wired_hub(sink: Arc<dyn TagSink>) -> (SignalHub, Arc<CountingSink>) {
        let counter = Arc::new(CountingSink::new(sink));
        let dispatcher = Arc::new(
            Dispatcher::from_settings(&TrackingSettings::default()).with_sink(counter.clone()),
        );
        let mut hub = SignalHub::new();
        wire(&dispatcher, &mut hub, &SignalMap::default());
        (hub, counter)
    }

    #[test]
    fn test_load_settings_defaults_and_override() {
        let settings = load_settings(None, Some("G-OVERRIDE".into())).unwrap();
        assert_eq!(settings.tracking_id, "G-OVERRIDE");

        let settings = load_settings(None, Some("  ".into())).unwrap();
        assert!(settings.tracking_id.is_empty());
    }

    #[test]
    fn test_load_settings_from_file() {
        let dir = std::env::temp_dir().join("gtagcart_test_settings");
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join("settings.json");
        std::fs::write(&path, r#"{"tracking_id":"G-FILE","events":["search"]}"#).unwrap();

        let settings = load_settings(Some(&path), None).unwrap();
        assert_eq!(settings.tracking_id, "G-FILE");
        assert_eq!(settings.events, vec!["search".to_string()]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_settings_missing_file() {
        let res = load_settings(Some(Path::new("/nonexistent/gtagcart.json")), None);
        assert!(res.unwrap_err().to_string().contains("Failed to open settings file"));
    }

    #[test]
    fn test_replay_counts_and_output() {
        let queue = Arc::new(TagQueue::installed());
        let (hub, counter) = wired_hub(queue.clone());
        let input = r#"{"signal":"product-search","context":{"search_term":"hat"}}

not json
{"signal":"unknown-signal"}
{"signal":"product-list-render","context":{"products":[]}}"#;

        let mut out = Vec::new();
        let summary = replay(Cursor::new(input), &hub, &queue, &counter, OutputFormat::Js, &mut out).unwrap();

        assert_eq!(
            summary,
            ReplaySummary {
                signals: 3,
                unrouted: 1,
                malformed: 1,
                emitted: 1,
            }
        );
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "gtag(\"event\", \"search\", {\"search_term\":\"hat\"});\n"
        );
    }

    #[test]
    fn test_replay_json_format() {
        let queue = Arc::new(TagQueue::installed());
        let (hub, counter) = wired_hub(queue.clone());
        let input = r#"{"signal":"store-notice-create","context":{"status":"error","message":"Out of stock"}}"#;

        let mut out = Vec::new();
        replay(Cursor::new(input), &hub, &queue, &counter, OutputFormat::Json, &mut out).unwrap();

        let line: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(
            line,
            json!(["event", "exception", {"description": "Out of stock", "fatal": false}])
        );
    }

    #[test]
    fn test_replay_counts_events_accepted_by_other_sinks() {
        let queue = TagQueue::installed();
        let (hub, counter) = wired_hub(Arc::new(Discard));
        let input = r#"{"signal":"product-search","context":{"search_term":"hat"}}
{"signal":"store-notice-create","context":{"status":"success","message":"Saved"}}"#;

        let mut out = Vec::new();
        let summary =
            replay(Cursor::new(input), &hub, &queue, &counter, OutputFormat::Js, &mut out).unwrap();

        assert_eq!(summary.signals, 2);
        assert_eq!(summary.emitted, 1);
        assert!(out.is_empty());
    }

    #[test]
    fn test_counting_sink_ignores_failures_and_non_events() {
        let counter = CountingSink::new(Arc::new(TagQueue::new()));
        assert_eq!(
            counter.send(TagCommand::event("search", Default::default())),
            Err(SinkError::Unavailable)
        );
        assert_eq!(counter.sent(), 0);

        let counter = CountingSink::new(Arc::new(Discard));
        counter.send(TagCommand::Js).unwrap();
        counter.send(TagCommand::event("search", Default::default())).unwrap();
        assert_eq!(counter.sent(), 1);
    }

    #[test]
    fn test_loader_tag_encodes_measurement_id() {
        let tag = loader_tag("G-1\"><script>").unwrap();
        assert_eq!(
            tag,
            "<script async src=\"https://www.googletagmanager.com/gtag/js?id=G-1%22%3E%3Cscript%3E\"></script>"
        );
    }

    #[test]
    fn test_measurement_protocol_sink_rejects_bad_url() {
        let res = MeasurementProtocolSink::new("not a url", "G-1", "secret", "1.1");
        assert!(res.is_err());
    }

    #[test]
    fn test_measurement_protocol_sink_skips_non_events() {
        let sink = MeasurementProtocolSink::new("http://127.0.0.1:9/mp/collect", "G-1", "secret", "1.1")
            .unwrap();
        assert_eq!(sink.send(TagCommand::Js), Ok(()));
    }
}
