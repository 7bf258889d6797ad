//! Fall detection.
//!
//! A fall shows up as a single very large acceleration spike at impact.
//! The detector fires on the first sample above the impact threshold and
//! then stays quiet for a cooldown, so one sustained episode (shaking,
//! tumbling) produces one alert.
//!
//! Known limitation: a second, genuine fall inside the cooldown window is
//! suppressed along with the rest of the episode.

use serde::{Deserialize, Serialize};

use crate::types::{FALL_COOLDOWN_MS, FALL_THRESHOLD};

/// Configuration for fall detection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FallDetectorConfig {
    /// Raw magnitude (m/s²) the sample must exceed.
    pub threshold: f64,
    /// Elapsed time since the previous alert that must be exceeded.
    pub cooldown_ms: i64,
}

impl Default for FallDetectorConfig {
    fn default() -> Self {
        Self {
            threshold: FALL_THRESHOLD,
            cooldown_ms: FALL_COOLDOWN_MS,
        }
    }
}

/// A detected impact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FallEvent {
    /// Raw magnitude of the triggering sample.
    pub magnitude: f64,
    /// Timestamp of the triggering sample.
    pub timestamp_ms: i64,
}

/// Threshold detector with a cooldown.
#[derive(Debug, Clone)]
pub struct FallDetector {
    config: FallDetectorConfig,
    last_fall_ms: Option<i64>,
    total_falls: u64,
}

impl FallDetector {
    pub fn new(config: FallDetectorConfig) -> Self {
        Self {
            config,
            last_fall_ms: None,
            total_falls: 0,
        }
    }

    /// Check one raw magnitude observed at `now_ms`.
    pub fn detect(&mut self, magnitude: f64, now_ms: i64) -> Option<FallEvent> {
        if magnitude <= self.config.threshold || !self.is_armed(now_ms) {
            return None;
        }

        self.last_fall_ms = Some(now_ms);
        self.total_falls += 1;

        Some(FallEvent {
            magnitude,
            timestamp_ms: now_ms,
        })
    }

    /// True when an impact at `now_ms` would raise an alert.
    pub fn is_armed(&self, now_ms: i64) -> bool {
        match self.last_fall_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) > self.config.cooldown_ms,
        }
    }

    /// Timestamp of the last alert, if any.
    pub fn last_fall_ms(&self) -> Option<i64> {
        self.last_fall_ms
    }

    pub fn total_falls(&self) -> u64 {
        self.total_falls
    }

    /// Re-arm immediately.
    pub fn reset(&mut self) {
        self.last_fall_ms = None;
    }
}

impl Default for FallDetector {
    fn default() -> Self {
        Self::new(FallDetectorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_on_first_impact() {
        let mut detector = FallDetector::default();
        assert!(detector.detect(20.0, 0).is_none());

        let event = detector.detect(30.0, 100).expect("impact should fire");
        assert_eq!(event.magnitude, 30.0);
        assert_eq!(event.timestamp_ms, 100);
        assert_eq!(detector.last_fall_ms(), Some(100));
    }

    #[test]
    fn test_threshold_is_strict() {
        let mut detector = FallDetector::default();
        assert!(detector.detect(25.0, 0).is_none());
        assert!(detector.detect(25.01, 0).is_some());
    }

    #[test]
    fn test_cooldown_suppresses_then_rearms() {
        let mut detector = FallDetector::default();
        assert!(detector.detect(30.0, 1_000).is_some());
        assert!(detector.detect(40.0, 2_000).is_none());
        assert!(detector.detect(40.0, 6_000).is_none(), "exactly 5000ms is still cooling");
        assert!(detector.detect(40.0, 6_001).is_some());
        assert_eq!(detector.total_falls(), 2);
    }

    #[test]
    fn test_suppressed_sample_does_not_extend_cooldown() {
        let mut detector = FallDetector::default();
        detector.detect(30.0, 0);
        detector.detect(30.0, 4_000);
        assert_eq!(detector.last_fall_ms(), Some(0));
        assert!(detector.detect(30.0, 5_001).is_some());
    }

    #[test]
    fn test_reset_rearms() {
        let mut detector = FallDetector::default();
        detector.detect(30.0, 0);
        detector.reset();
        assert!(detector.is_armed(1));
        assert!(detector.detect(30.0, 1).is_some());
    }
}
