//! User-visible notifications.
//!
//! The bridge decides *when* to notify; rendering is the host's job. Each
//! notification carries everything the host needs to build it: channel,
//! a stable id (so a repeat replaces instead of stacking), text, priority
//! and an optional vibration pattern.

use parking_lot::Mutex;
use serde::Serialize;

/// Notification channel all alerts are posted to.
pub const CHANNEL_ID: &str = "fitness_notifications";
/// Human-readable channel name.
pub const CHANNEL_NAME: &str = "Fitness Notifications";
/// Channel description shown in system settings.
pub const CHANNEL_DESCRIPTION: &str = "Step goal and safety alerts";

/// Notification id for the step goal.
pub const STEP_GOAL_NOTIFICATION_ID: i32 = 1;
/// Notification id for fall alerts.
pub const FALL_NOTIFICATION_ID: i32 = 2;

/// Vibration pattern for fall alerts: off/on durations in milliseconds.
pub const FALL_VIBRATION_PATTERN: [u64; 4] = [0, 500, 200, 500];

/// Host notification priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    High,
    Max,
}

/// A notification the host should display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// Raised once per session when the step count reaches the goal.
    StepGoalReached { steps: u32 },
    /// Raised with every fall alert that survives the cooldown.
    FallDetected { magnitude: f64, timestamp_ms: i64 },
}

impl Notification {
    pub fn id(&self) -> i32 {
        match self {
            Notification::StepGoalReached { .. } => STEP_GOAL_NOTIFICATION_ID,
            Notification::FallDetected { .. } => FALL_NOTIFICATION_ID,
        }
    }

    pub fn channel_id(&self) -> &'static str {
        CHANNEL_ID
    }

    pub fn title(&self) -> &'static str {
        match self {
            Notification::StepGoalReached { .. } => "Goal reached!",
            Notification::FallDetected { .. } => "Fall detected",
        }
    }

    pub fn body(&self) -> String {
        match self {
            Notification::StepGoalReached { steps } => {
                format!("You have completed {steps} steps. Keep it up!")
            }
            Notification::FallDetected { .. } => {
                "A possible fall was detected. Are you okay?".to_string()
            }
        }
    }

    pub fn priority(&self) -> NotificationPriority {
        match self {
            Notification::StepGoalReached { .. } => NotificationPriority::High,
            Notification::FallDetected { .. } => NotificationPriority::Max,
        }
    }

    pub fn vibration_pattern(&self) -> Option<&'static [u64]> {
        match self {
            Notification::StepGoalReached { .. } => None,
            Notification::FallDetected { .. } => Some(&FALL_VIBRATION_PATTERN),
        }
    }

    /// Notifications are dismissed when tapped.
    pub fn auto_cancel(&self) -> bool {
        true
    }
}

/// Sink for notifications. Implemented by the host.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Logs notifications through `tracing`. Useful headless and in the CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: &Notification) {
        tracing::info!(
            id = notification.id(),
            channel = notification.channel_id(),
            priority = ?notification.priority(),
            title = notification.title(),
            body = %notification.body(),
            "Notification raised"
        );
    }
}

/// Keeps notifications in memory until drained.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    pending: Mutex<Vec<Notification>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take everything raised so far.
    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.pending.lock())
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, notification: &Notification) {
        self.pending.lock().push(notification.clone());
    }
}
