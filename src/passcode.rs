//! APRS-IS passcode
//!
//! Servers accept a login only when the passcode matches this hash of the
//! callsign. The SSID does not take part.

const SEED: u16 = 0x73E2;

/// Passcode for `callsign`, case-insensitive, SSID ignored
pub fn generate(callsign: &str) -> u16 {
    let base = callsign.split('-').next().unwrap_or_default();

    let mut key = SEED;
    for (i, byte) in base.to_ascii_uppercase().bytes().enumerate() {
        let value = u16::from(byte);
        key ^= if i % 2 == 0 { value << 8 } else { value };
    }
    key & 0x7FFF
}
