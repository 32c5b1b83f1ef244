//! Decoder process supervision
//!
//! Runs the external capture and `multimon-ng` programs and extracts frame
//! announcements from the decoder output.

pub mod command;
pub mod supervisor;

pub use command::{AlsaConfig, CommandSpec, DecoderSource, RtlConfig, SourceMode};
pub use supervisor::{extract_frame, read_announcements, Supervisor};
