//! Step Detection Module.
//!
//! Counts a step every time the raw acceleration magnitude rises through a
//! fixed threshold. There is no debounce beyond the edge itself: a signal
//! that chatters around the threshold will overcount. That is an accepted
//! approximation for a wrist/pocket step counter at game rate.
//!
//! The detector reads the raw magnitude, not the smoothed average. Smoothing
//! would flatten the heel-strike peaks the edge is looking for.

use serde::Deserialize;

use crate::types::STEP_THRESHOLD;

/// Configuration for step detection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StepDetectorConfig {
    /// Magnitude (m/s²) the signal must rise strictly above.
    pub threshold: f64,
}

impl Default for StepDetectorConfig {
    fn default() -> Self {
        Self {
            threshold: STEP_THRESHOLD,
        }
    }
}

/// Rising-edge step counter.
#[derive(Debug, Clone)]
pub struct StepDetector {
    config: StepDetectorConfig,
    last_magnitude: f64,
    step_count: u32,
}

impl StepDetector {
    /// Create a new step detector with the given configuration.
    pub fn new(config: StepDetectorConfig) -> Self {
        Self {
            config,
            last_magnitude: 0.0,
            step_count: 0,
        }
    }

    /// Pure edge predicate: `magnitude` is above the threshold and
    /// `last_magnitude` was at or below it.
    pub fn detect(&self, magnitude: f64, last_magnitude: f64) -> bool {
        magnitude > self.config.threshold && last_magnitude <= self.config.threshold
    }

    /// Feed one raw magnitude. Returns true if it completed a step.
    pub fn process(&mut self, magnitude: f64) -> bool {
        let stepped = self.detect(magnitude, self.last_magnitude);
        if stepped {
            self.step_count = self.step_count.saturating_add(1);
        }
        self.last_magnitude = magnitude;
        stepped
    }

    /// Steps counted since the last reset.
    pub fn step_count(&self) -> u32 {
        self.step_count
    }

    /// Previous raw magnitude seen by `process`.
    pub fn last_magnitude(&self) -> f64 {
        self.last_magnitude
    }

    /// Zero the counter. Edge state is kept so a reset in the middle of a
    /// peak does not produce a phantom step.
    pub fn reset_count(&mut self) {
        self.step_count = 0;
    }

    /// Zero the counter and forget the previous magnitude.
    pub fn reset(&mut self) {
        self.step_count = 0;
        self.last_magnitude = 0.0;
    }
}

impl Default for StepDetector {
    fn default() -> Self {
        Self::new(StepDetectorConfig::default())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_detector_creation() {
        let detector = StepDetector::default();
        assert_eq!(detector.step_count(), 0);
        assert_eq!(detector.last_magnitude(), 0.0);
    }

    #[test]
    fn test_edge_predicate() {
        let detector = StepDetector::default();
        assert!(detector.detect(12.1, 12.0));
        assert!(detector.detect(13.0, 5.0));
        assert!(!detector.detect(12.0, 5.0), "must be strictly above");
        assert!(!detector.detect(13.0, 12.5), "already above");
        assert!(!detector.detect(5.0, 13.0), "falling edge");
    }

    #[test]
    fn test_worked_example_counts_two() {
        let mut detector = StepDetector::default();
        let stepped: Vec<bool> = [5.0, 13.0, 11.0, 14.0, 9.0]
            .iter()
            .map(|m| detector.process(*m))
            .collect();

        assert_eq!(stepped, vec![false, true, false, true, false]);
        assert_eq!(detector.step_count(), 2);
    }

    #[test]
    fn test_sustained_high_counts_once() {
        let mut detector = StepDetector::default();
        for m in [8.0, 12.5, 15.0, 13.0, 20.0, 12.01] {
            detector.process(m);
        }
        assert_eq!(detector.step_count(), 1);

        detector.process(12.0);
        detector.process(12.5);
        assert_eq!(detector.step_count(), 2);
    }

    #[test]
    fn test_reset_count_keeps_edge_state() {
        let mut detector = StepDetector::default();
        detector.process(14.0);
        detector.reset_count();
        assert_eq!(detector.step_count(), 0);

        // Still above threshold, so no new step.
        assert!(!detector.process(14.0));
        assert_eq!(detector.last_magnitude(), 14.0);
    }

    #[test]
    fn test_custom_threshold() {
        let mut detector = StepDetector::new(StepDetectorConfig { threshold: 2.0 });
        detector.process(1.0);
        assert!(detector.process(2.5));
    }
}
