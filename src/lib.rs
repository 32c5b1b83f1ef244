//! # Multimon iGate
//!
//! Receive-only APRS internet gateway. Frames decoded by `multimon-ng` are
//! validated, filtered and streamed to an APRS-IS relay server.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                        Decoder Supervisor (demod)                     │
//! │  ┌──────────────┐  stdout→stdin  ┌──────────────┐                     │
//! │  │ rtl_fm /     │ ─────────────▶ │ multimon-ng  │                     │
//! │  │ arecord      │                │ -a AFSK1200  │                     │
//! │  └──────────────┘                └──────┬───────┘                     │
//! │                                         │ "APRS: <tnc2>" lines        │
//! │                                  ┌──────▼───────┐                     │
//! │                                  │ Reader Thread│                     │
//! │                                  └──────┬───────┘                     │
//! └─────────────────────────────────────────┼─────────────────────────────┘
//!                                           ▼
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  Frame Pipeline (pipeline)                                            │
//! │    codec::decode ──▶ filter::annotate ──▶ filter::should_reject       │
//! └─────────────────────────────────────────┬─────────────────────────────┘
//!                                           │ send (10s timeout, drop)
//!                          Beacon Thread ───┤
//!                                           ▼
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  Delivery Channel (network)                                           │
//! │    Outbound Queue (bounded) ──▶ Worker Thread ──▶ TCP session          │
//! │    connect: round-robin gateway, login, reconnect with backoff        │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

pub mod beacon;
pub mod codec;
pub mod config;
pub mod demod;
pub mod error;
pub mod filter;
pub mod logging;
pub mod network;
pub mod passcode;
pub mod pipeline;
pub mod shutdown;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    use std::time::Duration;

    /// Maximum length of a serialized frame, excluding the line terminator
    pub const MAX_FRAME_LEN: usize = 510;

    /// Leading payload character of third-party (internet-origin) traffic
    pub const THIRD_PARTY_MARKER: char = '}';

    /// Path marker inserted before our callsign when annotating frames
    pub const RELAY_MARKER: &str = "qAR";

    /// Paths that show a frame already went through an internet gateway
    pub const DEFAULT_REJECT_PATHS: [&str; 4] = ["TCPIP", "TCPIP*", "NOGATE", "RFONLY"];

    /// Prefix multimon-ng puts in front of every decoded frame
    pub const FRAME_ANNOUNCEMENT: &str = "APRS: ";

    /// Audio sample rate fed to the decoder
    pub const SAMPLE_RATE: u32 = 22050;

    /// Software name sent in the login line
    pub const SOFTWARE_NAME: &str = "multimon-igate";

    /// Software version sent in the login line
    pub const SOFTWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

    /// Default server-side filter expression
    pub const DEFAULT_FILTER: &str = "r/38/-171/1";

    /// Default outbound queue capacity
    pub const DEFAULT_QUEUE_CAPACITY: usize = 1;

    /// How long `send` waits for a queue slot before dropping the frame
    pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

    /// How long the worker waits for a frame per loop iteration
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

    /// Delay between failed connection attempts
    pub const DEFAULT_CONNECT_RETRY: Duration = Duration::from_secs(1);

    /// Bounds of the random delay after a connection error
    pub const DEFAULT_RECONNECT_BACKOFF_MIN: Duration = Duration::from_secs(1);
    pub const DEFAULT_RECONNECT_BACKOFF_MAX: Duration = Duration::from_secs(20);

    /// Socket connect and login read timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Size of the non-blocking drain read
    pub const DRAIN_BUFFER_SIZE: usize = 40960;

    /// Granularity of interruptible sleeps
    pub const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(100);
}
