//! Complete motion pipeline integrating all per-sample stages.
//!
//! This module orchestrates the data flow from a raw accelerometer sample
//! through smoothing, fall detection, step counting and activity
//! classification to the events and notifications the host consumes.
//!
//! # Architecture
//!
//! Per sample, in this order:
//! 1. **Magnitude**: Euclidean norm of the raw vector
//! 2. **Smoothing**: push into the magnitude window, read the average
//! 3. **Fall detection**: raw magnitude against the impact threshold
//! 4. **Step detection**: raw magnitude rising edge, step goal check
//! 5. **Activity classification**: smoothed magnitude with hysteresis
//! 6. **Emission throttle**: a `MotionUpdate` every `emit_every` samples
//!
//! Fall events bypass the throttle and are placed ahead of any update
//! produced by the same sample.
//!
//! # Session lifecycle
//!
//! One `MotionPipeline` is one listening session's `MotionState`. It is
//! built when the event stream is subscribed and dropped when it is
//! cancelled; nothing is persisted. The control surface (`start`, `stop`,
//! `reset`) only touches the step counter and goal flag unless
//! `full_reset_on_start` is set.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::activity::{ActivityClassifier, ActivityConfig};
use crate::error::{Result, StrideError};
use crate::fall_detection::{FallDetector, FallDetectorConfig};
use crate::notify::Notification;
use crate::signal::{MagnitudeWindow, SmootherConfig};
use crate::step_detection::{StepDetector, StepDetectorConfig};
use crate::types::{ActivityType, MotionEvent, MotionSample, EMIT_EVERY, STEP_GOAL};

/// Default capacity of the stream input and output queues.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Configuration for the complete motion pipeline.
///
/// Bundles all sub-component configurations. Every field has a default equal
/// to the tuned constant, so an empty TOML document is a valid config.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Magnitude smoothing.
    pub smoother: SmootherConfig,

    /// Step edge threshold.
    pub step: StepDetectorConfig,

    /// Activity breakpoints and hysteresis.
    pub activity: ActivityConfig,

    /// Fall threshold and cooldown.
    pub fall: FallDetectorConfig,

    /// Emit a `MotionUpdate` once every this many samples.
    pub emit_every: u32,

    /// Step count that raises the goal notification.
    pub step_goal: u32,

    /// When set, `start` and `reset` also clear smoothing history, activity
    /// tracking and the fall cooldown instead of only the step counters.
    pub full_reset_on_start: bool,

    /// Capacity of the bounded queues used by `stream`.
    pub queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            smoother: SmootherConfig::default(),
            step: StepDetectorConfig::default(),
            activity: ActivityConfig::default(),
            fall: FallDetectorConfig::default(),
            emit_every: EMIT_EVERY,
            step_goal: STEP_GOAL,
            full_reset_on_start: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.smoother.history_size == 0 {
            return Err(StrideError::Config("smoother.history_size must be at least 1".into()));
        }
        if self.emit_every == 0 {
            return Err(StrideError::Config("emit_every must be at least 1".into()));
        }
        if self.queue_capacity == 0 {
            return Err(StrideError::Config("queue_capacity must be at least 1".into()));
        }
        if self.activity.walking_breakpoint >= self.activity.running_breakpoint {
            return Err(StrideError::Config(
                "activity.walking_breakpoint must be below activity.running_breakpoint".into(),
            ));
        }
        if self.fall.cooldown_ms < 0 {
            return Err(StrideError::Config("fall.cooldown_ms must not be negative".into()));
        }
        Ok(())
    }
}

// ============================================================================
// CONTROL SURFACE
// ============================================================================

/// Command accepted on the accelerometer control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Start,
    Stop,
    Reset,
}

impl ControlCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlCommand::Start => "start",
            ControlCommand::Stop => "stop",
            ControlCommand::Reset => "reset",
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlCommand {
    type Err = StrideError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "start" => Ok(ControlCommand::Start),
            "stop" => Ok(ControlCommand::Stop),
            "reset" => Ok(ControlCommand::Reset),
            other => Err(StrideError::UnsupportedOperation(other.to_string())),
        }
    }
}

/// Control state of a session. Informational: samples are processed in
/// either state, attaching and detaching the sensor is the stream's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlState {
    #[default]
    Idle,
    Active,
}

// ============================================================================
// STATE & OUTPUT
// ============================================================================

/// Snapshot of a session's motion state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MotionState {
    pub step_count: u32,
    pub last_magnitude: f64,
    pub goal_notification_sent: bool,
    /// Activity label reported on the last sample.
    pub last_activity_type: ActivityType,
    pub activity_confidence: u32,
    pub last_fall_detection_ms: Option<i64>,
    /// Smoothing window contents, oldest first.
    pub magnitude_history: Vec<f64>,
    /// Samples since the last emitted `MotionUpdate`.
    pub sample_count: u32,
    pub control_state: ControlState,
}

/// Everything one sample produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleOutput {
    /// Events for the application, in delivery order.
    pub events: Vec<MotionEvent>,
    /// Notifications the host should raise.
    pub notifications: Vec<Notification>,
}

impl SampleOutput {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.notifications.is_empty()
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Stateful motion classifier for one listening session.
#[derive(Debug, Clone)]
pub struct MotionPipeline {
    config: PipelineConfig,

    // Processing stages
    window: MagnitudeWindow,
    step_detector: StepDetector,
    activity: ActivityClassifier,
    fall_detector: FallDetector,

    // Session counters
    goal_notification_sent: bool,
    sample_count: u32,
    total_samples: u64,
    control_state: ControlState,
}

impl MotionPipeline {
    /// Creates a new pipeline with given configuration.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            window: MagnitudeWindow::new(&config.smoother),
            step_detector: StepDetector::new(config.step.clone()),
            activity: ActivityClassifier::new(config.activity.clone()),
            fall_detector: FallDetector::new(config.fall.clone()),
            config,
            goal_notification_sent: false,
            sample_count: 0,
            total_samples: 0,
            control_state: ControlState::Idle,
        }
    }

    /// Processes a single sample through every stage.
    pub fn process_sample(&mut self, sample: &MotionSample) -> SampleOutput {
        let mut output = SampleOutput::default();

        let magnitude = sample.magnitude();
        let avg_magnitude = self.window.push_magnitude(magnitude);

        if let Some(fall) = self.fall_detector.detect(magnitude, sample.timestamp_ms) {
            tracing::warn!(
                magnitude = fall.magnitude,
                timestamp_ms = fall.timestamp_ms,
                "Fall detected"
            );
            output.notifications.push(Notification::FallDetected {
                magnitude: fall.magnitude,
                timestamp_ms: fall.timestamp_ms,
            });
            output.events.push(MotionEvent::FallDetected {
                magnitude: fall.magnitude,
                timestamp_ms: fall.timestamp_ms,
            });
        }

        if self.step_detector.process(magnitude) {
            let steps = self.step_detector.step_count();
            if steps >= self.config.step_goal && !self.goal_notification_sent {
                self.goal_notification_sent = true;
                tracing::info!(step_count = steps, "Step goal reached");
                output
                    .notifications
                    .push(Notification::StepGoalReached { steps });
            }
        }

        let activity_type = self.activity.classify(avg_magnitude);

        self.total_samples += 1;
        self.sample_count += 1;
        if self.sample_count >= self.config.emit_every {
            self.sample_count = 0;
            let step_count = self.step_detector.step_count();
            tracing::debug!(
                step_count,
                activity = %activity_type,
                avg_magnitude,
                "Emitting motion update"
            );
            output.events.push(MotionEvent::MotionUpdate {
                step_count,
                activity_type,
                avg_magnitude,
            });
        }

        output
    }

    /// Processes a batch of samples and concatenates their outputs.
    pub fn process_batch(&mut self, samples: &[MotionSample]) -> SampleOutput {
        let mut output = SampleOutput::default();
        for sample in samples {
            let one = self.process_sample(sample);
            output.events.extend(one.events);
            output.notifications.extend(one.notifications);
        }
        output
    }

    /// Applies a control command and returns the resulting control state.
    pub fn apply(&mut self, command: ControlCommand) -> ControlState {
        match command {
            ControlCommand::Start => {
                self.control_state = ControlState::Active;
                self.reset_session_counters();
            }
            ControlCommand::Stop => {
                self.control_state = ControlState::Idle;
            }
            ControlCommand::Reset => {
                self.reset_session_counters();
            }
        }
        tracing::info!(
            command = %command,
            state = ?self.control_state,
            full_reset = self.config.full_reset_on_start,
            "Control command applied"
        );
        self.control_state
    }

    /// Parses and applies a control command by name.
    pub fn handle_command(&mut self, name: &str) -> Result<ControlState> {
        let command: ControlCommand = name.parse()?;
        Ok(self.apply(command))
    }

    fn reset_session_counters(&mut self) {
        self.step_detector.reset_count();
        self.goal_notification_sent = false;

        if self.config.full_reset_on_start {
            self.window.clear();
            self.step_detector.reset();
            self.activity.reset();
            self.fall_detector.reset();
            self.sample_count = 0;
        }
    }

    /// Snapshot of the session state.
    pub fn state(&self) -> MotionState {
        MotionState {
            step_count: self.step_detector.step_count(),
            last_magnitude: self.step_detector.last_magnitude(),
            goal_notification_sent: self.goal_notification_sent,
            last_activity_type: self.activity.reported(),
            activity_confidence: self.activity.confidence(),
            last_fall_detection_ms: self.fall_detector.last_fall_ms(),
            magnitude_history: self.window.values(),
            sample_count: self.sample_count,
            control_state: self.control_state,
        }
    }

    pub fn step_count(&self) -> u32 {
        self.step_detector.step_count()
    }

    pub fn activity_type(&self) -> ActivityType {
        self.activity.reported()
    }

    pub fn avg_magnitude(&self) -> f64 {
        self.window.average()
    }

    pub fn control_state(&self) -> ControlState {
        self.control_state
    }

    /// Returns the total sample count processed so far.
    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

impl Default for MotionPipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(magnitude: f32, timestamp_ms: i64) -> MotionSample {
        MotionSample::new(0.0, 0.0, magnitude, timestamp_ms)
    }

    #[test]
    fn test_pipeline_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.emit_every, 3);
        assert_eq!(config.step_goal, 30);
        assert_eq!(config.smoother.history_size, 10);
        assert!(!config.full_reset_on_start);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pipeline_creation() {
        let pipeline = MotionPipeline::default();
        let state = pipeline.state();
        assert_eq!(state.step_count, 0);
        assert_eq!(state.last_activity_type, ActivityType::Stationary);
        assert_eq!(state.control_state, ControlState::Idle);
        assert!(state.magnitude_history.is_empty());
        assert_eq!(pipeline.total_samples(), 0);
    }

    #[test]
    fn test_update_every_third_sample() {
        let mut pipeline = MotionPipeline::default();
        let emitted: Vec<bool> = (0..9)
            .map(|i| !pipeline.process_sample(&sample(9.8, i * 20)).events.is_empty())
            .collect();

        assert_eq!(
            emitted,
            vec![false, false, true, false, false, true, false, false, true]
        );
    }

    #[test]
    fn test_update_carries_current_values() {
        let mut pipeline = MotionPipeline::default();
        pipeline.process_sample(&sample(5.0, 0));
        pipeline.process_sample(&sample(13.0, 20));
        let out = pipeline.process_sample(&sample(9.0, 40));

        match out.events.as_slice() {
            [MotionEvent::MotionUpdate { step_count, activity_type, avg_magnitude }] => {
                assert_eq!(*step_count, 1);
                assert_eq!(*activity_type, ActivityType::Stationary);
                assert!((avg_magnitude - 9.0).abs() < 1e-6);
            }
            other => panic!("unexpected events {other:?}"),
        }
    }

    #[test]
    fn test_fall_bypasses_throttle_and_precedes_update() {
        let mut pipeline = MotionPipeline::default();

        let first = pipeline.process_sample(&sample(30.0, 0));
        assert_eq!(first.events.len(), 1);
        assert!(first.events[0].is_fall());
        assert_eq!(first.notifications.len(), 1);

        pipeline.process_sample(&sample(9.8, 20));
        let third = pipeline.process_sample(&sample(9.8, 40));
        assert_eq!(third.events.len(), 1);
        assert!(!third.events[0].is_fall());

        // Fall on a throttle boundary: fall first, then the update.
        let mut pipeline = MotionPipeline::default();
        pipeline.process_sample(&sample(9.8, 0));
        pipeline.process_sample(&sample(9.8, 20));
        let out = pipeline.process_sample(&sample(30.0, 40));
        assert_eq!(out.events.len(), 2);
        assert!(out.events[0].is_fall());
        assert!(!out.events[1].is_fall());
    }

    #[test]
    fn test_step_goal_notifies_once() {
        let mut pipeline = MotionPipeline::default();
        let mut goal_notifications = 0;

        for i in 0..40 {
            let t = i * 100;
            let high = pipeline.process_sample(&sample(14.0, t));
            let low = pipeline.process_sample(&sample(9.0, t + 50));
            goal_notifications += high
                .notifications
                .iter()
                .chain(low.notifications.iter())
                .filter(|n| matches!(n, Notification::StepGoalReached { .. }))
                .count();
        }

        assert_eq!(pipeline.step_count(), 40);
        assert_eq!(goal_notifications, 1);
        assert!(pipeline.state().goal_notification_sent);
    }

    #[test]
    fn test_goal_notification_carries_step_count() {
        let mut config = PipelineConfig::default();
        config.step_goal = 2;
        let mut pipeline = MotionPipeline::new(config);

        pipeline.process_sample(&sample(14.0, 0));
        pipeline.process_sample(&sample(9.0, 20));
        let out = pipeline.process_sample(&sample(14.0, 40));
        assert_eq!(
            out.notifications,
            vec![Notification::StepGoalReached { steps: 2 }]
        );
    }

    #[test]
    fn test_start_resets_counters_only() {
        let mut pipeline = MotionPipeline::default();
        pipeline.process_sample(&sample(30.0, 0));
        pipeline.process_sample(&sample(9.0, 20));
        pipeline.process_sample(&sample(14.0, 40));
        for i in 0..6 {
            pipeline.process_sample(&sample(16.0, 60 + i * 20));
        }
        let before = pipeline.state();
        assert!(before.step_count > 0);

        assert_eq!(pipeline.apply(ControlCommand::Start), ControlState::Active);
        let after = pipeline.state();

        assert_eq!(after.step_count, 0);
        assert!(!after.goal_notification_sent);
        assert_eq!(after.magnitude_history, before.magnitude_history);
        assert_eq!(after.last_activity_type, before.last_activity_type);
        assert_eq!(after.last_fall_detection_ms, before.last_fall_detection_ms);
        assert_eq!(after.sample_count, before.sample_count);
    }

    #[test]
    fn test_full_reset_clears_everything() {
        let mut config = PipelineConfig::default();
        config.full_reset_on_start = true;
        let mut pipeline = MotionPipeline::new(config);

        pipeline.process_sample(&sample(30.0, 0));
        for i in 0..6 {
            pipeline.process_sample(&sample(16.0, 20 + i * 20));
        }
        pipeline.apply(ControlCommand::Reset);

        let state = pipeline.state();
        assert_eq!(state.step_count, 0);
        assert!(state.magnitude_history.is_empty());
        assert_eq!(state.last_activity_type, ActivityType::Stationary);
        assert_eq!(state.last_fall_detection_ms, None);
        assert_eq!(state.sample_count, 0);
    }

    #[test]
    fn test_stop_does_not_touch_motion_state() {
        let mut pipeline = MotionPipeline::default();
        pipeline.apply(ControlCommand::Start);
        pipeline.process_sample(&sample(14.0, 0));

        assert_eq!(pipeline.apply(ControlCommand::Stop), ControlState::Idle);
        assert_eq!(pipeline.step_count(), 1);
    }

    #[test]
    fn test_reset_keeps_control_state() {
        let mut pipeline = MotionPipeline::default();
        pipeline.apply(ControlCommand::Start);
        assert_eq!(pipeline.apply(ControlCommand::Reset), ControlState::Active);

        let mut idle = MotionPipeline::default();
        assert_eq!(idle.apply(ControlCommand::Reset), ControlState::Idle);
    }

    #[test]
    fn test_unknown_command_rejected() {
        let mut pipeline = MotionPipeline::default();
        let err = pipeline.handle_command("pause").unwrap_err();
        assert!(matches!(err, StrideError::UnsupportedOperation(ref m) if m == "pause"));
        assert_eq!(pipeline.handle_command("start").unwrap(), ControlState::Active);
    }

    #[test]
    fn test_config_from_toml() {
        let config = PipelineConfig::from_toml_str(
            r#"
            emit_every = 5
            full_reset_on_start = true

            [fall]
            cooldown_ms = 2000
            "#,
        )
        .unwrap();

        assert_eq!(config.emit_every, 5);
        assert!(config.full_reset_on_start);
        assert_eq!(config.fall.cooldown_ms, 2000);
        assert_eq!(config.fall.threshold, 25.0);
        assert_eq!(config.step.threshold, 12.0);
    }

    #[test]
    fn test_config_validation() {
        assert!(PipelineConfig::from_toml_str("emit_every = 0").is_err());
        assert!(PipelineConfig::from_toml_str(
            "[activity]\nwalking_breakpoint = 14.0\nrunning_breakpoint = 13.5"
        )
        .is_err());
        assert!(matches!(
            PipelineConfig::from_toml_str("emit_every = \"three\""),
            Err(StrideError::Toml(_))
        ));
    }

    #[test]
    fn test_config_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stride.toml");
        std::fs::write(&path, "step_goal = 100\n").unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.step_goal, 100);

        let missing = PipelineConfig::load(dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(StrideError::Io(_))));
    }
}
