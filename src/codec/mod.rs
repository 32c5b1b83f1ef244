//! TNC2 frame codec
//!
//! Converts between the line-oriented `SOURCE>DEST,PATH:PAYLOAD` text
//! produced by the decoder and the [`Frame`] struct handed to the
//! delivery channel.

pub mod decoder;
pub mod encoder;

pub use decoder::decode;
pub use encoder::{encode, encode_line};

use serde::{Deserialize, Serialize};
use std::fmt;

/// One relay-network packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Originating station (callsign with optional `-SSID`)
    pub source: String,
    /// Protocol destination identifier
    pub destination: String,
    /// Digipeater path, most recent relay last
    pub path: Vec<String>,
    /// Packet body
    pub payload: String,
}

impl Frame {
    pub fn new(
        source: impl Into<String>,
        destination: impl Into<String>,
        path: Vec<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            path,
            payload: payload.into(),
        }
    }

    /// Untruncated TNC2 text
    pub fn to_tnc2(&self) -> String {
        format!(
            "{}>{},{}:{}",
            self.source,
            self.destination,
            self.path.join(","),
            self.payload
        )
    }

    /// True if the payload carries the third-party marker
    pub fn is_third_party(&self) -> bool {
        self.payload.starts_with(crate::constants::THIRD_PARTY_MARKER)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_tnc2())
    }
}

/// Single-byte character set used on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Charset {
    /// ISO-8859-1, every byte is one character
    #[default]
    Latin1,
    /// 7-bit ASCII
    Ascii,
}

impl Charset {
    fn max_code_point(self) -> u32 {
        match self {
            Charset::Latin1 => 0xFF,
            Charset::Ascii => 0x7F,
        }
    }
}
