use gtagcart_core::settings::TrackingSettings;
use gtagcart_core::snippet::{bootstrap_commands, render_snippet};
use std::error::Error;
use std::fs::File;

fn main() -> Result<(), Box<dyn Error>> {
    let settings: TrackingSettings = match std::env::args().nth(1) {
        Some(path) => serde_json::from_reader(File::open(path)?)?,
        None => TrackingSettings {
            tracking_id: "G-EXAMPLE1".into(),
            ..TrackingSettings::default()
        },
    };

    let commands = bootstrap_commands(&settings)?;
    print!("{}", render_snippet(&commands));
    Ok(())
}
