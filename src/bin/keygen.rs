//! APRS-IS passcode generator

use clap::Parser;

use multimon_igate::passcode;

#[derive(Parser, Debug)]
#[command(name = "keygen", version, about = "Generate the APRS-IS passcode for a callsign")]
struct Cli {
    /// Callsign, with or without SSID
    callsign: String,
}

fn main() {
    let cli = Cli::parse();
    let callsign = cli.callsign.to_uppercase();
    println!("Key for {}: {}", callsign, passcode::generate(&callsign));
}
