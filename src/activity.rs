//! Activity classification with hysteresis.
//!
//! Maps the smoothed magnitude to one of three coarse labels. A run of
//! agreeing candidates builds confidence; until it reaches the required
//! level the label reported is the candidate seen on the previous sample,
//! so a lone noisy sample is never reported on the sample that produced it.
//!
//! Design:
//! - the *candidate* sequence drives a consecutive-agreement counter
//! - with enough confidence the current candidate is reported
//! - otherwise the previous sample's candidate is reported
//!
//! A steady change therefore surfaces one sample late, and at the latest
//! when the counter reaches the required confidence.

use serde::Deserialize;

use crate::types::{ActivityType, REQUIRED_CONFIDENCE, RUNNING_BREAKPOINT, WALKING_BREAKPOINT};

/// Configuration for activity classification.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ActivityConfig {
    /// Smoothed magnitude below which the candidate is stationary.
    pub walking_breakpoint: f64,

    /// Smoothed magnitude below which the candidate is walking; at or above
    /// it the candidate is running.
    pub running_breakpoint: f64,

    /// Agreement count at which the current candidate is reported directly.
    /// The first sample of a run counts as zero, so with the default of 3
    /// the fourth identical candidate in a row is reported as it arrives.
    pub required_confidence: u32,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            walking_breakpoint: WALKING_BREAKPOINT,
            running_breakpoint: RUNNING_BREAKPOINT,
            required_confidence: REQUIRED_CONFIDENCE,
        }
    }
}

/// Hysteresis classifier over smoothed magnitudes.
#[derive(Debug, Clone)]
pub struct ActivityClassifier {
    config: ActivityConfig,
    last_candidate: ActivityType,
    reported: ActivityType,
    confidence: u32,
}

impl ActivityClassifier {
    pub fn new(config: ActivityConfig) -> Self {
        Self {
            config,
            last_candidate: ActivityType::Stationary,
            reported: ActivityType::Stationary,
            confidence: 0,
        }
    }

    /// Raw label for a smoothed magnitude, without hysteresis.
    pub fn candidate(&self, avg_magnitude: f64) -> ActivityType {
        if avg_magnitude < self.config.walking_breakpoint {
            ActivityType::Stationary
        } else if avg_magnitude < self.config.running_breakpoint {
            ActivityType::Walking
        } else {
            ActivityType::Running
        }
    }

    /// Feed one smoothed magnitude and return the label to report.
    pub fn classify(&mut self, avg_magnitude: f64) -> ActivityType {
        let candidate = self.candidate(avg_magnitude);

        if candidate == self.last_candidate {
            self.confidence = self.confidence.saturating_add(1);
        } else {
            self.confidence = 0;
        }

        self.reported = if self.confidence >= self.config.required_confidence {
            candidate
        } else {
            self.last_candidate
        };
        self.last_candidate = candidate;

        self.reported
    }

    /// Label returned by the most recent `classify`.
    pub fn reported(&self) -> ActivityType {
        self.reported
    }

    /// Candidate produced by the previous sample.
    pub fn last_candidate(&self) -> ActivityType {
        self.last_candidate
    }

    /// Consecutive-agreement counter.
    pub fn confidence(&self) -> u32 {
        self.confidence
    }

    /// Back to stationary with no accumulated confidence.
    pub fn reset(&mut self) {
        self.last_candidate = ActivityType::Stationary;
        self.reported = ActivityType::Stationary;
        self.confidence = 0;
    }
}

impl Default for ActivityClassifier {
    fn default() -> Self {
        Self::new(ActivityConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STILL: f64 = 9.8;
    const WALK: f64 = 12.0;
    const RUN: f64 = 15.0;

    #[test]
    fn test_candidate_breakpoints() {
        let classifier = ActivityClassifier::default();
        assert_eq!(classifier.candidate(10.49), ActivityType::Stationary);
        assert_eq!(classifier.candidate(10.5), ActivityType::Walking);
        assert_eq!(classifier.candidate(13.49), ActivityType::Walking);
        assert_eq!(classifier.candidate(13.5), ActivityType::Running);
    }

    #[test]
    fn test_running_reported_from_fourth_sample() {
        let mut classifier = ActivityClassifier::default();
        let labels: Vec<ActivityType> = [WALK, WALK, RUN, RUN, RUN, RUN]
            .iter()
            .map(|m| classifier.classify(*m))
            .collect();

        assert_eq!(
            labels,
            vec![
                ActivityType::Stationary,
                ActivityType::Walking,
                ActivityType::Walking,
                ActivityType::Running,
                ActivityType::Running,
                ActivityType::Running,
            ]
        );
        assert_eq!(classifier.confidence(), 3);
    }

    #[test]
    fn test_confident_candidate_reported_immediately() {
        let mut classifier = ActivityClassifier::default();
        for _ in 0..4 {
            classifier.classify(STILL);
        }
        assert_eq!(classifier.confidence(), 4);
        assert_eq!(classifier.classify(STILL), ActivityType::Stationary);
        assert_eq!(classifier.reported(), ActivityType::Stationary);
    }

    #[test]
    fn test_single_noisy_sample_reported_one_sample_late() {
        let mut classifier = ActivityClassifier::default();
        for _ in 0..5 {
            classifier.classify(WALK);
        }
        assert_eq!(classifier.reported(), ActivityType::Walking);

        // The spike itself reports the previous candidate; the sample after
        // reports the spike's candidate, then walking returns.
        assert_eq!(classifier.classify(RUN), ActivityType::Walking);
        assert_eq!(classifier.confidence(), 0);
        assert_eq!(classifier.classify(WALK), ActivityType::Running);
        assert_eq!(classifier.classify(WALK), ActivityType::Walking);
    }

    #[test]
    fn test_confidence_follows_candidates() {
        let mut classifier = ActivityClassifier::default();
        classifier.classify(STILL);
        classifier.classify(STILL);
        assert_eq!(classifier.confidence(), 2);

        // The counter restarts on the walking candidate regardless of what
        // was reported.
        classifier.classify(WALK);
        assert_eq!(classifier.last_candidate(), ActivityType::Walking);
        assert_eq!(classifier.confidence(), 0);
    }

    #[test]
    fn test_initial_stationary_run_counts_from_one() {
        let mut classifier = ActivityClassifier::default();
        classifier.classify(STILL);
        assert_eq!(classifier.confidence(), 1);
    }

    #[test]
    fn test_reset() {
        let mut classifier = ActivityClassifier::default();
        for _ in 0..6 {
            classifier.classify(RUN);
        }
        classifier.reset();
        assert_eq!(classifier.reported(), ActivityType::Stationary);
        assert_eq!(classifier.confidence(), 0);
    }
}
