use gtagcart_core::event::StoreSignal;
use gtagcart_core::{TagQueue, TrackingSettings};
use gtagcart_events::{wire, Dispatcher, SignalHub, SignalMap};
use std::io::{self, BufRead};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let queue = Arc::new(TagQueue::installed());
    let dispatcher =
        Arc::new(Dispatcher::from_settings(&TrackingSettings::default()).with_sink(queue.clone()));

    let mut hub = SignalHub::new();
    wire(&dispatcher, &mut hub, &SignalMap::default());

    for line in io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let signal: StoreSignal = serde_json::from_str(&line)?;
        hub.emit_signal(&signal);
    }

    for entry in queue.drain() {
        println!("{}", entry.command.to_js());
    }
    Ok(())
}
