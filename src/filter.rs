//! Path filter
//!
//! Decides which frames are relayed to the internet. Frames that already
//! passed through an internet gateway are dropped to prevent loops, and
//! accepted frames may be tagged with our own callsign.

use std::collections::HashSet;

use crate::codec::Frame;
use crate::constants::{DEFAULT_REJECT_PATHS, RELAY_MARKER};

/// Append the relay marker and our callsign to the frame path.
///
/// Not idempotent: call it exactly once per frame.
pub fn annotate(frame: &mut Frame, own_callsign: &str, append_enabled: bool) {
    if append_enabled {
        frame.path.push(RELAY_MARKER.to_string());
        frame.path.push(own_callsign.to_string());
    }
}

/// True if the frame must not be relayed
pub fn should_reject(
    frame: &Frame,
    reject_paths: &HashSet<String>,
    reject_internet_origin: bool,
) -> bool {
    frame.path.iter().any(|hop| reject_paths.contains(hop))
        || (reject_internet_origin && frame.is_third_party())
}

/// The default reject set
pub fn default_reject_paths() -> HashSet<String> {
    DEFAULT_REJECT_PATHS.iter().map(|s| s.to_string()).collect()
}

/// Result of applying the filter policy to a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject,
}

/// Configured filter policy
#[derive(Debug, Clone)]
pub struct PathFilter {
    callsign: String,
    append_callsign: bool,
    reject_paths: HashSet<String>,
    reject_internet: bool,
}

impl PathFilter {
    pub fn new(
        callsign: impl Into<String>,
        append_callsign: bool,
        reject_paths: HashSet<String>,
        reject_internet: bool,
    ) -> Self {
        Self {
            callsign: callsign.into(),
            append_callsign,
            reject_paths,
            reject_internet,
        }
    }

    /// Annotate, then test for rejection.
    ///
    /// Our own marker is appended first; the reject set only matches
    /// markers added by other gateways, so it cannot reject itself.
    pub fn apply(&self, frame: &mut Frame) -> Verdict {
        annotate(frame, &self.callsign, self.append_callsign);
        if should_reject(frame, &self.reject_paths, self.reject_internet) {
            Verdict::Reject
        } else {
            Verdict::Accept
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(path: &[&str], payload: &str) -> Frame {
        Frame::new(
            "N0CALL",
            "APRS",
            path.iter().map(|s| s.to_string()).collect(),
            payload,
        )
    }

    #[test]
    fn test_reject_internet_paths() {
        let reject = default_reject_paths();
        for marker in DEFAULT_REJECT_PATHS {
            assert!(should_reject(&frame(&["WIDE1-1", marker], "x"), &reject, false));
        }
        assert!(!should_reject(&frame(&["WIDE1-1"], "x"), &reject, true));
    }

    #[test]
    fn test_reject_third_party() {
        let reject = default_reject_paths();
        let f = frame(&["WIDE1-1"], "}N1CALL>APRS,TCPIP:hi");
        assert!(should_reject(&f, &reject, true));
        assert!(!should_reject(&f, &reject, false));
        assert!(should_reject(&frame(&[], "}x"), &HashSet::new(), true));
    }

    #[test]
    fn test_annotate_appends_once_per_call() {
        let mut f = frame(&["WIDE1-1"], "x");
        annotate(&mut f, "DL1ABC-10", false);
        assert_eq!(f.path, vec!["WIDE1-1"]);

        annotate(&mut f, "DL1ABC-10", true);
        assert_eq!(f.path, vec!["WIDE1-1", "qAR", "DL1ABC-10"]);

        annotate(&mut f, "DL1ABC-10", true);
        assert_eq!(f.path.len(), 5);
    }

    #[test]
    fn test_own_annotation_does_not_reject() {
        let filter = PathFilter::new("DL1ABC-10", true, default_reject_paths(), true);
        let mut f = frame(&["WIDE2-1"], "!4903.50N/07201.75W-");
        assert_eq!(filter.apply(&mut f), Verdict::Accept);
        assert_eq!(f.path, vec!["WIDE2-1", "qAR", "DL1ABC-10"]);

        let mut f = frame(&["TCPIP*"], "x");
        assert_eq!(filter.apply(&mut f), Verdict::Reject);
    }

    #[test]
    fn test_custom_reject_set() {
        let reject: HashSet<String> = ["WIDE2-2".to_string()].into_iter().collect();
        let filter = PathFilter::new("DL1ABC", false, reject, false);
        assert_eq!(filter.apply(&mut frame(&["WIDE2-2"], "x")), Verdict::Reject);
        assert_eq!(filter.apply(&mut frame(&["TCPIP"], "x")), Verdict::Accept);
    }
}
