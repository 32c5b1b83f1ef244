//! Periodic beacons
//!
//! Position, status and weather reports for the gateway station itself.
//! Beacon frames bypass the path filter and go straight to the delivery
//! channel.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::Span;

use crate::codec::Frame;
use crate::error::BeaconError;
use crate::pipeline::FrameSink;
use crate::shutdown::StopFlag;

/// Tag appended to weather reports to identify the software
pub const WEATHER_SOFTWARE_TAG: &str = "MmIG";

const BEACON_DESTINATION: &str = "APRS";
const BEACON_PATH: &str = "TCPIP*";
const MAX_AMBIGUITY: u8 = 4;

const KMH_TO_MPH: f64 = 0.621371192;
const MM_PER_INCH: f64 = 25.4;

fn default_table() -> char {
    '/'
}

fn default_send_every() -> u64 {
    1800
}

/// `beacon` configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeaconConfig {
    pub lat: f64,
    pub lng: f64,
    #[serde(default = "default_table")]
    pub table: char,
    pub symbol: char,
    #[serde(default)]
    pub comment: String,
    /// Number of trailing position digits blanked out (0-4)
    #[serde(default)]
    pub ambiguity: u8,
    /// Seconds between beacon rounds
    #[serde(default = "default_send_every")]
    pub send_every: u64,
    #[serde(default)]
    pub status: StatusConfig,
    /// JSON file with the latest weather observation
    #[serde(default)]
    pub weather: Option<PathBuf>,
}

/// Status text, from a file or inline; the file wins when it exists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusConfig {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Weather observation in metric units
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WeatherReport {
    /// Unix time of the observation
    pub timestamp: f64,
    #[serde(default)]
    pub wind: Wind,
    /// °C
    pub temperature: Option<f64>,
    #[serde(default)]
    pub rain: Rain,
    /// Percent
    pub humidity: Option<f64>,
    /// hPa
    pub pressure: Option<f64>,
}

/// km/h, direction in degrees
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Wind {
    pub direction: Option<f64>,
    pub speed: Option<f64>,
    pub gust: Option<f64>,
}

/// Millimetres
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Rain {
    pub rainlast1h: Option<f64>,
    pub rainlast24h: Option<f64>,
    pub rainmidnight: Option<f64>,
}

/// `DDMM.mmN`
pub fn encode_lat(lat: f64) -> String {
    let (degrees, minutes) = split_degrees(lat);
    let direction = if lat >= 0.0 { 'N' } else { 'S' };
    format!("{:02}{}{}", degrees, minutes, direction)
}

/// `DDDMM.mmE`
pub fn encode_lng(lng: f64) -> String {
    let (degrees, minutes) = split_degrees(lng);
    let direction = if lng >= 0.0 { 'E' } else { 'W' };
    format!("{:03}{}{}", degrees, minutes, direction)
}

/// Whole degrees and `MM.mm` minutes, rounded to hundredths of a minute
fn split_degrees(value: f64) -> (u64, String) {
    let hundredths = (value.abs() * 6000.0).round() as u64;
    let minutes = hundredths % 6000;
    (
        hundredths / 6000,
        format!("{:02}.{:02}", minutes / 100, minutes % 100),
    )
}

/// Blank out the last `ambiguity` digits of an encoded coordinate
pub fn apply_ambiguity(encoded: &str, ambiguity: u8) -> String {
    let mut chars: Vec<char> = encoded.chars().collect();
    let mut remaining = ambiguity.min(MAX_AMBIGUITY);

    // the last char is the hemisphere
    let digits = chars.len().saturating_sub(1);
    for c in chars[..digits].iter_mut().rev() {
        if remaining == 0 {
            break;
        }
        if *c == '.' {
            continue;
        }
        *c = ' ';
        remaining -= 1;
    }
    chars.into_iter().collect()
}

/// `=` position report without timestamp
pub fn position_payload(config: &BeaconConfig) -> String {
    format!(
        "={}{}{}{}{}",
        apply_ambiguity(&encode_lat(config.lat), config.ambiguity),
        config.table,
        apply_ambiguity(&encode_lng(config.lng), config.ambiguity),
        config.symbol,
        config.comment
    )
}

/// Status text, or `None` when neither file nor text is configured
pub fn status_text(status: &StatusConfig) -> Result<Option<String>, BeaconError> {
    if let Some(path) = status.file.as_deref().filter(|p| p.exists()) {
        let text = std::fs::read_to_string(path).map_err(|source| BeaconError::Read {
            path: path.display().to_string(),
            source,
        })?;
        return Ok(Some(text.trim().to_string()));
    }
    Ok(status.text.clone().filter(|text| !text.is_empty()))
}

/// Positionless weather report, `_MMDDHHMMc...s...g...t...`
pub fn weather_payload(report: &WeatherReport) -> Result<String, BeaconError> {
    let timestamp = report.timestamp as i64;
    let time = DateTime::from_timestamp(timestamp, 0).ok_or(BeaconError::Timestamp(timestamp))?;

    let mut payload = format!("_{}", time.format("%m%d%H%M"));
    push_field(&mut payload, 'c', 3, report.wind.direction);
    push_field(&mut payload, 's', 3, report.wind.speed.map(|v| v * KMH_TO_MPH));
    push_field(&mut payload, 'g', 3, report.wind.gust.map(|v| v * KMH_TO_MPH));
    push_field(&mut payload, 't', 3, report.temperature.map(|c| c * 9.0 / 5.0 + 32.0));
    push_field(&mut payload, 'r', 3, report.rain.rainlast1h.map(mm_to_hundredths));
    push_field(&mut payload, 'p', 3, report.rain.rainlast24h.map(mm_to_hundredths));
    push_field(&mut payload, 'P', 3, report.rain.rainmidnight.map(mm_to_hundredths));

    // h00 means 100%
    let humidity = report.humidity.map(|h| match h.round() as i64 {
        0 => 1.0,
        100 => 0.0,
        h => h as f64,
    });
    push_field(&mut payload, 'h', 2, humidity);

    if let Some(pressure) = report.pressure {
        payload.push_str(&format!("b{:05}", (pressure * 10.0).round() as i64));
    }

    payload.push_str(WEATHER_SOFTWARE_TAG);
    Ok(payload)
}

fn mm_to_hundredths(mm: f64) -> f64 {
    mm / MM_PER_INCH * 100.0
}

/// Append `tag` and the rounded value, or dots when unknown
fn push_field(payload: &mut String, tag: char, width: usize, value: Option<f64>) {
    payload.push(tag);
    match value {
        Some(v) => payload.push_str(&format!("{:0width$}", v.round() as i64, width = width)),
        None => payload.extend(std::iter::repeat('.').take(width)),
    }
}

/// Read and encode a weather observation file
pub fn read_weather(path: &Path) -> Result<String, BeaconError> {
    let data = std::fs::read_to_string(path).map_err(|source| BeaconError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let report: WeatherReport = serde_json::from_str(&data)?;
    weather_payload(&report)
}

fn beacon_frame(callsign: &str, payload: String) -> Frame {
    Frame::new(
        callsign,
        BEACON_DESTINATION,
        vec![BEACON_PATH.to_string()],
        payload,
    )
}

/// All frames of one beacon round
pub fn beacon_frames(callsign: &str, config: &BeaconConfig) -> Vec<Frame> {
    let mut frames = vec![beacon_frame(callsign, position_payload(config))];

    match status_text(&config.status) {
        Ok(Some(text)) => frames.push(beacon_frame(callsign, format!(">{}", text))),
        Ok(None) => {}
        Err(e) => tracing::warn!("Skipping status beacon: {}", e),
    }

    if let Some(path) = &config.weather {
        match read_weather(path) {
            Ok(payload) => frames.push(beacon_frame(callsign, payload)),
            Err(e) => tracing::warn!("Skipping weather beacon: {}", e),
        }
    }

    frames
}

/// Background thread sending a beacon round every `send_every` seconds
pub struct Beacon {
    stop: StopFlag,
    thread_handle: Option<JoinHandle<()>>,
}

impl Beacon {
    pub fn start<S>(
        callsign: String,
        config: BeaconConfig,
        sink: S,
        span: Span,
    ) -> std::io::Result<Self>
    where
        S: FrameSink + 'static,
    {
        let stop = StopFlag::new();
        let thread_stop = stop.clone();
        let interval = Duration::from_secs(config.send_every.max(1));

        let handle = thread::Builder::new()
            .name("igate-beacon".into())
            .spawn(move || {
                let _enter = span.enter();
                loop {
                    for frame in beacon_frames(&callsign, &config) {
                        tracing::debug!("Beacon: {}", frame);
                        // the sink logs dropped frames itself
                        let _ = sink.send(frame);
                    }
                    if !thread_stop.sleep(interval) {
                        break;
                    }
                }
                tracing::debug!("Beacon thread exit");
            })?;

        Ok(Self {
            stop,
            thread_handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        self.stop.stop();
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Beacon {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NetworkError;
    use parking_lot::Mutex;
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    fn config() -> BeaconConfig {
        BeaconConfig {
            lat: 49.058333,
            lng: -72.029167,
            table: '/',
            symbol: '-',
            comment: "multimon iGate".into(),
            ambiguity: 0,
            send_every: 1800,
            status: StatusConfig::default(),
            weather: None,
        }
    }

    #[test]
    fn test_coordinates() {
        assert_eq!(encode_lat(49.058333), "4903.50N");
        assert_eq!(encode_lng(-72.029167), "07201.75W");
        assert_eq!(encode_lat(-33.5), "3330.00S");
        assert_eq!(encode_lng(8.0), "00800.00E");
        // 59.999 minutes must carry into the degrees
        assert_eq!(encode_lat(10.99999), "1100.00N");
    }

    #[test]
    fn test_ambiguity() {
        assert_eq!(apply_ambiguity("4903.50N", 0), "4903.50N");
        assert_eq!(apply_ambiguity("4903.50N", 1), "4903.5 N");
        assert_eq!(apply_ambiguity("4903.50N", 2), "4903.  N");
        assert_eq!(apply_ambiguity("4903.50N", 3), "490 .  N");
        assert_eq!(apply_ambiguity("4903.50N", 4), "49  .  N");
        assert_eq!(apply_ambiguity("07201.75W", 9), "072  .  W");
    }

    #[test]
    fn test_position_payload() {
        assert_eq!(
            position_payload(&config()),
            "=4903.50N/07201.75W-multimon iGate"
        );

        let mut vague = config();
        vague.ambiguity = 2;
        vague.comment.clear();
        assert_eq!(position_payload(&vague), "=4903.  N/07201.  W-");
    }

    #[test]
    fn test_status_file_wins() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "  from file  ").unwrap();

        let status = StatusConfig {
            text: Some("inline".into()),
            file: Some(file.path().to_path_buf()),
        };
        assert_eq!(status_text(&status).unwrap().as_deref(), Some("from file"));

        let missing = StatusConfig {
            text: Some("inline".into()),
            file: Some("/nonexistent/status.txt".into()),
        };
        assert_eq!(status_text(&missing).unwrap().as_deref(), Some("inline"));
        assert_eq!(status_text(&StatusConfig::default()).unwrap(), None);
    }

    #[test]
    fn test_weather_payload() {
        let report: WeatherReport = serde_json::from_str(
            r#"{
                "timestamp": 1476536460,
                "wind": {"direction": 220, "speed": 10, "gust": 25},
                "temperature": 21.5,
                "rain": {"rainlast1h": 1.2, "rainlast24h": 10, "rainmidnight": 2.54},
                "humidity": 55,
                "pressure": 1013.2
            }"#,
        )
        .unwrap();

        assert_eq!(
            weather_payload(&report).unwrap(),
            "_10151301c220s006g016t071r005p039P010h55b10132MmIG"
        );
    }

    #[test]
    fn test_low_pressure_keeps_five_digits() {
        let report: WeatherReport =
            serde_json::from_str(r#"{"timestamp": 0, "pressure": 985.3}"#).unwrap();
        assert_eq!(
            weather_payload(&report).unwrap(),
            "_01010000c...s...g...t...r...p...P...h..b09853MmIG"
        );
    }

    #[test]
    fn test_weather_unknown_fields() {
        let report: WeatherReport =
            serde_json::from_str(r#"{"timestamp": 0, "humidity": 100}"#).unwrap();
        assert_eq!(
            weather_payload(&report).unwrap(),
            "_01010000c...s...g...t...r...p...P...h00MmIG"
        );
    }

    #[test]
    fn test_beacon_round() {
        let mut weather = NamedTempFile::new().unwrap();
        write!(weather, r#"{{"timestamp": 0, "temperature": -15}}"#).unwrap();

        let mut config = config();
        config.status.text = Some("on the air".into());
        config.weather = Some(weather.path().to_path_buf());

        let frames = beacon_frames("N0CALL-10", &config);
        let lines: Vec<String> = frames.iter().map(Frame::to_tnc2).collect();
        assert_eq!(
            lines,
            vec![
                "N0CALL-10>APRS,TCPIP*:=4903.50N/07201.75W-multimon iGate",
                "N0CALL-10>APRS,TCPIP*:>on the air",
                "N0CALL-10>APRS,TCPIP*:_01010000c...s...g...t005r...p...P...h..MmIG",
            ]
        );
    }

    #[test]
    fn test_bad_weather_file_is_skipped() {
        let mut weather = NamedTempFile::new().unwrap();
        write!(weather, "not json").unwrap();

        let mut config = config();
        config.weather = Some(weather.path().to_path_buf());
        assert_eq!(beacon_frames("N0CALL", &config).len(), 1);
    }

    #[derive(Clone, Default)]
    struct Collect(Arc<Mutex<Vec<Frame>>>);

    impl FrameSink for Collect {
        fn send(&self, frame: Frame) -> Result<(), NetworkError> {
            self.0.lock().push(frame);
            Ok(())
        }
    }

    #[test]
    fn test_beacon_thread_sends_then_stops() {
        let sink = Collect::default();
        let mut beacon =
            Beacon::start("N0CALL".into(), config(), sink.clone(), Span::none()).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while sink.0.lock().is_empty() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        beacon.stop();

        let frames = sink.0.lock();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].payload.starts_with("=4903.50N/"));
    }
}
