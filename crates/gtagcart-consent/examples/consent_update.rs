use gtagcart_consent::{update_command, ConsentChanges};
use gtagcart_core::ConsentDefaults;
use std::io::{self, Read};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;

    println!("{}", ConsentDefaults::default().to_command().to_js());

    let changes: ConsentChanges = if input.trim().is_empty() {
        ConsentChanges::from([("statistics".to_string(), "allow".to_string())])
    } else {
        serde_json::from_str(&input)?
    };
    match update_command(&changes) {
        Some(command) => println!("{}", command.to_js()),
        None => eprintln!("no consent flags affected"),
    }
    Ok(())
}
