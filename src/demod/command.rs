//! Capture and decoder command lines
//!
//! Maps the configured audio source onto the external programs that feed
//! multimon-ng.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::Command;

use crate::constants::SAMPLE_RATE;

/// Program used when no rtl command is configured
pub const DEFAULT_RTL_COMMAND: &str = "rtl_fm";

/// The decoder binary
pub const DECODER_COMMAND: &str = "multimon-ng";

/// Where audio comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// multimon-ng reads the system audio server directly
    Pulse,
    /// Software-defined radio via rtl_fm (or a compatible tool)
    Rtl,
    /// Raw capture via arecord
    Alsa,
}

/// rtl_fm settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RtlConfig {
    /// Frequency in MHz
    pub freq: f64,
    #[serde(default)]
    pub ppm: i32,
    #[serde(default)]
    pub gain: f64,
    /// Negative values omit `-d`, for tools such as `rx_fm`
    #[serde(default)]
    pub device_index: i32,
    #[serde(default)]
    pub offset_tuning: bool,
    /// Replacement for `rtl_fm`, e.g. `rx_fm` for SoapySDR devices
    #[serde(default)]
    pub command: Option<String>,
}

/// arecord settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlsaConfig {
    pub device: String,
}

/// Fully specified audio source
#[derive(Debug, Clone, PartialEq)]
pub enum DecoderSource {
    Pulse,
    Rtl(RtlConfig),
    Alsa(AlsaConfig),
}

impl DecoderSource {
    pub fn mode(&self) -> SourceMode {
        match self {
            DecoderSource::Pulse => SourceMode::Pulse,
            DecoderSource::Rtl(_) => SourceMode::Rtl,
            DecoderSource::Alsa(_) => SourceMode::Alsa,
        }
    }

    /// Capture command feeding the decoder's stdin, if any
    pub fn capture_command(&self) -> Option<CommandSpec> {
        match self {
            DecoderSource::Pulse => None,
            DecoderSource::Rtl(rtl) => Some(rtl_command(rtl)),
            DecoderSource::Alsa(alsa) => Some(alsa_command(alsa)),
        }
    }

    /// multimon-ng invocation for this source
    pub fn decoder_command(&self) -> CommandSpec {
        self.decoder_command_for(DECODER_COMMAND)
    }

    /// Decoder invocation using `program` in place of multimon-ng
    pub fn decoder_command_for(&self, program: &str) -> CommandSpec {
        let mut args = vec!["-a", "AFSK1200", "-A"];
        if self.capture_command().is_some() {
            args.extend(["-t", "raw", "-"]);
        }
        CommandSpec::new(program, args)
    }
}

/// Program plus arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

fn rtl_command(rtl: &RtlConfig) -> CommandSpec {
    let program = rtl.command.as_deref().unwrap_or(DEFAULT_RTL_COMMAND);
    let frequency = (rtl.freq * 1e6).round() as u64;
    let tuning = if rtl.offset_tuning { "offset" } else { "none" };

    let mut args = vec![
        "-f".to_string(),
        frequency.to_string(),
        "-s".to_string(),
        SAMPLE_RATE.to_string(),
        "-p".to_string(),
        rtl.ppm.to_string(),
        "-g".to_string(),
        rtl.gain.to_string(),
        "-E".to_string(),
        tuning.to_string(),
    ];
    if rtl.device_index >= 0 {
        args.push("-d".to_string());
        args.push(rtl.device_index.to_string());
    }
    args.push("-".to_string());

    CommandSpec::new(program, args)
}

fn alsa_command(alsa: &AlsaConfig) -> CommandSpec {
    let rate = SAMPLE_RATE.to_string();
    CommandSpec::new(
        "arecord",
        [
            "-D",
            alsa.device.as_str(),
            "-r",
            rate.as_str(),
            "-f",
            "S16_LE",
            "-t",
            "raw",
            "-c",
            "1",
            "-",
        ],
    )
}
