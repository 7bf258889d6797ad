//! Core data types for the motion bridge.
//!
//! This module defines the values that cross component boundaries: raw
//! accelerometer samples coming in from the sensor source, location fixes
//! coming in from the location provider, and the classified events going
//! out to the application.
//!
//! Design principle: Types should make intent obvious. If a concept exists,
//! it gets a type. Never pass raw tuples or untyped maps across boundaries;
//! the map encoding the application expects lives in `channel`.

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// TUNED CONSTANTS
// ============================================================================

/// Raw magnitude a sample must rise above to count as a step (m/s²).
pub const STEP_THRESHOLD: f64 = 12.0;

/// Raw magnitude above which a sample is treated as a fall impact (m/s²).
pub const FALL_THRESHOLD: f64 = 25.0;

/// Minimum time between two fall alerts in milliseconds.
pub const FALL_COOLDOWN_MS: i64 = 5000;

/// Smoothed magnitude below which the candidate activity is stationary.
pub const WALKING_BREAKPOINT: f64 = 10.5;

/// Smoothed magnitude below which the candidate activity is walking.
pub const RUNNING_BREAKPOINT: f64 = 13.5;

/// Consecutive candidate agreements needed before the label changes.
pub const REQUIRED_CONFIDENCE: u32 = 3;

/// Capacity of the magnitude smoothing window.
pub const HISTORY_SIZE: usize = 10;

/// A `MotionUpdate` is emitted once every this many processed samples.
pub const EMIT_EVERY: u32 = 3;

/// Step count at which the goal notification fires.
pub const STEP_GOAL: u32 = 30;

// ============================================================================
// INPUT SAMPLES
// ============================================================================

/// A single raw accelerometer sample.
///
/// Produced by the sensor source at irregular intervals (nominally ~50 Hz)
/// and never persisted. Readings are in m/s² and include gravity, so a
/// device lying still reads roughly 9.81.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotionSample {
    /// Acceleration along the device x axis.
    pub x: f32,
    /// Acceleration along the device y axis.
    pub y: f32,
    /// Acceleration along the device z axis.
    pub z: f32,
    /// Wall-clock timestamp in milliseconds since the epoch.
    #[serde(rename = "timestampMillis", alias = "timestamp")]
    pub timestamp_ms: i64,
}

impl MotionSample {
    /// Creates a new sample.
    pub fn new(x: f32, y: f32, z: f32, timestamp_ms: i64) -> Self {
        Self { x, y, z, timestamp_ms }
    }

    /// Euclidean norm of the acceleration vector, computed in f64.
    pub fn magnitude(&self) -> f64 {
        let x = self.x as f64;
        let y = self.y as f64;
        let z = self.z as f64;
        (x * x + y * y + z * z).sqrt()
    }
}

/// A location fix as delivered by the platform location provider.
///
/// Relayed unmodified; the bridge keeps no state about fixes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Altitude above the WGS84 ellipsoid in meters.
    pub altitude: f64,
    /// Ground speed in meters per second.
    #[serde(rename = "speed")]
    pub speed_mps: f32,
    /// Horizontal accuracy radius in meters.
    #[serde(rename = "accuracy")]
    pub accuracy_meters: f32,
    /// Fix time in milliseconds since the epoch.
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

/// Coarse activity label derived from the smoothed magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    /// Smoothed magnitude near gravity alone.
    #[default]
    Stationary,
    /// Moderate periodic acceleration.
    Walking,
    /// Strong periodic acceleration.
    Running,
}

impl ActivityType {
    /// Wire name used by the application.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Stationary => "stationary",
            ActivityType::Walking => "walking",
            ActivityType::Running => "running",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// OUTPUT EVENTS
// ============================================================================

/// A classified event delivered downstream to the application.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MotionEvent {
    /// Throttled composite update, emitted once every `emit_every` samples.
    MotionUpdate {
        /// Steps counted in the current session.
        step_count: u32,
        /// Hysteresis-filtered activity label.
        activity_type: ActivityType,
        /// Moving average of the magnitude window.
        avg_magnitude: f64,
    },
    /// Fall alert, emitted immediately and never throttled.
    FallDetected {
        /// Raw magnitude of the triggering sample.
        magnitude: f64,
        /// Timestamp of the triggering sample.
        timestamp_ms: i64,
    },
}

impl MotionEvent {
    /// Returns true for fall alerts.
    pub fn is_fall(&self) -> bool {
        matches!(self, MotionEvent::FallDetected { .. })
    }
}
