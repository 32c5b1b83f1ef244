//! Configuration file
//!
//! JSON or TOML, chosen by file extension. Unknown extensions are tried as
//! TOML.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::beacon::BeaconConfig;
use crate::codec::Charset;
use crate::constants::*;
use crate::demod::{AlsaConfig, DecoderSource, RtlConfig, SourceMode, Supervisor};
use crate::error::{Error, Result};
use crate::filter::PathFilter;
use crate::network::{AddressFamily, Backoff, ChannelConfig, GatewayCycle, Login};
use crate::passcode;

/// Login passcode, written as a number or a string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Passcode {
    Number(i64),
    Text(String),
}

impl fmt::Display for Passcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Passcode::Number(n) => write!(f, "{}", n),
            Passcode::Text(s) => f.write_str(s),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub callsign: String,
    /// Computed from the callsign when omitted
    #[serde(default)]
    pub passcode: Option<Passcode>,
    pub gateways: Vec<String>,
    #[serde(default)]
    pub preferred_protocol: AddressFamily,
    #[serde(default)]
    pub append_callsign: bool,
    #[serde(default = "default_source")]
    pub source: SourceMode,
    #[serde(default)]
    pub rtl: Option<RtlConfig>,
    #[serde(default)]
    pub alsa: Option<AlsaConfig>,
    /// Replacement for `multimon-ng`, e.g. a full path
    #[serde(default)]
    pub multimon_command: Option<String>,
    #[serde(default = "default_reject_paths")]
    pub reject_paths: Vec<String>,
    #[serde(default = "default_true")]
    pub reject_internet: bool,
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default)]
    pub charset: Charset,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: f64,
    #[serde(default = "default_connect_retry")]
    pub connect_retry_secs: f64,
    #[serde(default = "default_backoff_min")]
    pub reconnect_backoff_min_secs: f64,
    #[serde(default = "default_backoff_max")]
    pub reconnect_backoff_max_secs: f64,
    #[serde(default)]
    pub beacon: Option<BeaconConfig>,
}

fn default_source() -> SourceMode {
    SourceMode::Rtl
}

fn default_reject_paths() -> Vec<String> {
    DEFAULT_REJECT_PATHS.iter().map(|s| s.to_string()).collect()
}

fn default_true() -> bool {
    true
}

fn default_filter() -> String {
    DEFAULT_FILTER.to_string()
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_send_timeout() -> f64 {
    DEFAULT_SEND_TIMEOUT.as_secs_f64()
}

fn default_connect_retry() -> f64 {
    DEFAULT_CONNECT_RETRY.as_secs_f64()
}

fn default_backoff_min() -> f64 {
    DEFAULT_RECONNECT_BACKOFF_MIN.as_secs_f64()
}

fn default_backoff_max() -> f64 {
    DEFAULT_RECONNECT_BACKOFF_MAX.as_secs_f64()
}

impl AppConfig {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        let is_json = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
        let config = if is_json {
            Self::from_json(&content)?
        } else {
            Self::from_toml(&content)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| Error::Config(format!("failed to parse config: {}", e)))
    }

    pub fn from_toml(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::Config(format!("failed to parse config: {}", e)))
    }

    /// `<config dir>/multimon-igate/igate.toml`
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", SOFTWARE_NAME).map(|dirs| dirs.config_dir().join("igate.toml"))
    }

    /// Check everything that serde cannot
    pub fn validate(&self) -> Result<()> {
        if self.callsign.trim().is_empty() {
            return Err(Error::Config("callsign must not be empty".into()));
        }
        self.gateway_cycle()?;
        self.decoder_source()?;

        let durations = [
            ("send_timeout_secs", self.send_timeout_secs),
            ("connect_retry_secs", self.connect_retry_secs),
            ("reconnect_backoff_min_secs", self.reconnect_backoff_min_secs),
            ("reconnect_backoff_max_secs", self.reconnect_backoff_max_secs),
        ];
        for (name, value) in durations {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::Config(format!("{} must be a non-negative number", name)));
            }
        }
        if self.reconnect_backoff_max_secs < self.reconnect_backoff_min_secs {
            return Err(Error::Config(
                "reconnect_backoff_max_secs is below reconnect_backoff_min_secs".into(),
            ));
        }

        if let Some(program) = &self.multimon_command {
            if program.trim().is_empty() {
                return Err(Error::Config("multimon_command must not be empty".into()));
            }
        }

        if let Some(beacon) = &self.beacon {
            if !(-90.0..=90.0).contains(&beacon.lat) || !(-180.0..=180.0).contains(&beacon.lng) {
                return Err(Error::Config("beacon position out of range".into()));
            }
        }
        Ok(())
    }

    pub fn gateway_cycle(&self) -> Result<GatewayCycle> {
        GatewayCycle::parse(&self.gateways).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn decoder_source(&self) -> Result<DecoderSource> {
        match self.source {
            SourceMode::Pulse => Ok(DecoderSource::Pulse),
            SourceMode::Rtl => self
                .rtl
                .clone()
                .map(DecoderSource::Rtl)
                .ok_or_else(|| Error::Config("source \"rtl\" needs an [rtl] section".into())),
            SourceMode::Alsa => self
                .alsa
                .clone()
                .map(DecoderSource::Alsa)
                .ok_or_else(|| Error::Config("source \"alsa\" needs an [alsa] section".into())),
        }
    }

    /// Supervisor running the configured capture and decoder programs
    pub fn supervisor(&self) -> Result<Supervisor> {
        let source = self.decoder_source()?;
        let decoder = match &self.multimon_command {
            Some(program) => source.decoder_command_for(program),
            None => source.decoder_command(),
        };
        Ok(Supervisor::with_commands(source.capture_command(), decoder))
    }

    pub fn passcode(&self) -> String {
        match &self.passcode {
            Some(passcode) => passcode.to_string(),
            None => passcode::generate(&self.callsign).to_string(),
        }
    }

    pub fn login(&self) -> Login {
        Login {
            callsign: self.callsign.clone(),
            passcode: self.passcode(),
            filter: self.filter.clone(),
        }
    }

    pub fn path_filter(&self) -> PathFilter {
        let reject_paths: HashSet<String> = self.reject_paths.iter().cloned().collect();
        PathFilter::new(
            self.callsign.clone(),
            self.append_callsign,
            reject_paths,
            self.reject_internet,
        )
    }

    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            queue_capacity: self.queue_capacity,
            send_timeout: secs(self.send_timeout_secs),
            poll_interval: DEFAULT_POLL_INTERVAL,
            connect_retry: secs(self.connect_retry_secs),
            reconnect_backoff: Backoff {
                min: secs(self.reconnect_backoff_min_secs),
                max: secs(self.reconnect_backoff_max_secs),
            },
            charset: self.charset,
        }
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_default()
}
