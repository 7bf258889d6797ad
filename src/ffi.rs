//! C FFI bindings for native mobile bridges.
//!
//! Exposes the synchronous motion pipeline through a C ABI so a platform
//! sensor callback can feed samples directly and poll for the events and
//! notifications they produce.
//!
//! Memory Safety:
//! - All returned strings must be freed with `motion_free_string()`
//! - The engine instance must be freed with `motion_engine_destroy()`
//! - NULL checks are performed on all inputs
//!
//! Thread Safety:
//! - The engine is NOT thread-safe. Use a single thread or mutex.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use serde_json::{json, Value};

use crate::channel::encode_motion_event;
use crate::notify::{Notification, CHANNEL_DESCRIPTION, CHANNEL_NAME};
use crate::pipeline::{ControlCommand, MotionPipeline, PipelineConfig};
use crate::types::{ActivityType, MotionEvent, MotionSample};

// ============================================================================
// OPAQUE HANDLE TYPES
// ============================================================================

/// Opaque handle to a motion session.
pub struct MotionEngine {
    pipeline: MotionPipeline,
    pending_events: Vec<MotionEvent>,
    pending_notifications: Vec<Notification>,
}

impl MotionEngine {
    fn new(config: PipelineConfig) -> Self {
        Self {
            pipeline: MotionPipeline::new(config),
            pending_events: Vec::new(),
            pending_notifications: Vec::new(),
        }
    }
}

/// Result status codes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionStatus {
    /// Operation succeeded.
    Ok = 0,
    /// Null pointer provided.
    NullPointer = 1,
    /// Invalid parameter value.
    InvalidParameter = 2,
    /// Internal error.
    InternalError = 3,
}

/// Output from a single sample.
#[repr(C)]
#[derive(Debug, Clone, Default)]
pub struct MotionSampleOutput {
    /// Sample timestamp in milliseconds.
    pub timestamp_ms: i64,
    /// Steps counted in this session.
    pub step_count: u32,
    /// Reported activity (0=Stationary, 1=Walking, 2=Running).
    pub activity_type: i32,
    /// Smoothed magnitude in m/s².
    pub avg_magnitude: f64,
    /// A step edge was crossed on this sample (0 or 1).
    pub step_detected: i32,
    /// A fall event was raised on this sample (0 or 1).
    pub fall_detected: i32,
    /// A motion update was emitted on this sample (0 or 1).
    pub update_emitted: i32,
}

/// Engine options. Zero fields fall back to defaults.
#[repr(C)]
#[derive(Debug, Clone, Default)]
pub struct MotionEngineConfig {
    /// Step goal for the goal notification (0 = 30).
    pub step_goal: u32,
    /// Emit a motion update every N samples (0 = 3).
    pub emit_every: u32,
    /// Clear all signal state on start/reset, not just the counters.
    pub full_reset_on_start: i32,
}

fn activity_code(activity: ActivityType) -> i32 {
    match activity {
        ActivityType::Stationary => 0,
        ActivityType::Walking => 1,
        ActivityType::Running => 2,
    }
}

fn notification_json(notification: &Notification) -> Value {
    json!({
        "id": notification.id(),
        "channelId": notification.channel_id(),
        "channelName": CHANNEL_NAME,
        "channelDescription": CHANNEL_DESCRIPTION,
        "title": notification.title(),
        "body": notification.body(),
        "priority": notification.priority(),
        "vibrationPattern": notification.vibration_pattern(),
        "autoCancel": notification.auto_cancel(),
    })
}

fn into_c_string(value: Value) -> *mut c_char {
    match CString::new(value.to_string()) {
        Ok(s) => s.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// ENGINE LIFECYCLE
// ============================================================================

/// Create a new motion engine.
///
/// # Safety
/// - `config` may be NULL (all defaults) or a valid pointer to `MotionEngineConfig`.
/// - The returned pointer must be freed with `motion_engine_destroy()`.
#[no_mangle]
pub unsafe extern "C" fn motion_engine_create(config: *const MotionEngineConfig) -> *mut MotionEngine {
    let mut pipeline_config = PipelineConfig::default();

    if !config.is_null() {
        let config = &*config;
        if config.step_goal > 0 {
            pipeline_config.step_goal = config.step_goal;
        }
        if config.emit_every > 0 {
            pipeline_config.emit_every = config.emit_every;
        }
        pipeline_config.full_reset_on_start = config.full_reset_on_start != 0;
    }

    Box::into_raw(Box::new(MotionEngine::new(pipeline_config)))
}

/// Create a motion engine from a TOML configuration document.
///
/// # Safety
/// - `toml` must be a valid null-terminated UTF-8 string.
///
/// # Returns
/// - NULL if the document is missing, malformed or out of range.
#[no_mangle]
pub unsafe extern "C" fn motion_engine_create_from_toml(toml: *const c_char) -> *mut MotionEngine {
    if toml.is_null() {
        return ptr::null_mut();
    }

    let text = match CStr::from_ptr(toml).to_str() {
        Ok(s) => s,
        Err(_) => return ptr::null_mut(),
    };

    match PipelineConfig::from_toml_str(text) {
        Ok(config) => Box::into_raw(Box::new(MotionEngine::new(config))),
        Err(err) => {
            tracing::warn!(error = %err, "Rejected engine configuration");
            ptr::null_mut()
        }
    }
}

/// Destroy a motion engine.
///
/// # Safety
/// - `engine` must be a valid pointer from `motion_engine_create*()`.
/// - Must not be called more than once for the same pointer.
#[no_mangle]
pub unsafe extern "C" fn motion_engine_destroy(engine: *mut MotionEngine) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

/// Apply a control command (`"start"`, `"stop"` or `"reset"`).
///
/// # Safety
/// - `engine` must be a valid pointer.
/// - `command` must be a valid null-terminated string.
#[no_mangle]
pub unsafe extern "C" fn motion_engine_control(engine: *mut MotionEngine, command: *const c_char) -> MotionStatus {
    if engine.is_null() || command.is_null() {
        return MotionStatus::NullPointer;
    }

    let engine = &mut *engine;
    let command = match CStr::from_ptr(command).to_str() {
        Ok(s) => s,
        Err(_) => return MotionStatus::InvalidParameter,
    };

    match command.parse::<ControlCommand>() {
        Ok(command) => {
            engine.pipeline.apply(command);
            MotionStatus::Ok
        }
        Err(_) => MotionStatus::InvalidParameter,
    }
}

// ============================================================================
// SAMPLE PROCESSING
// ============================================================================

/// Process a single accelerometer sample.
///
/// Events and notifications raised by the sample are queued on the engine
/// until taken with `motion_engine_take_events_json()` and
/// `motion_engine_take_notifications_json()`.
///
/// # Safety
/// - `engine` must be a valid pointer.
/// - `output` may be NULL or a valid pointer to receive results.
///
/// # Parameters
/// - `timestamp_ms`: Sample timestamp in milliseconds.
/// - `x/y/z`: Accelerometer readings in m/s², gravity included.
#[no_mangle]
pub unsafe extern "C" fn motion_engine_process_sample(
    engine: *mut MotionEngine,
    timestamp_ms: i64,
    x: f32,
    y: f32,
    z: f32,
    output: *mut MotionSampleOutput,
) -> MotionStatus {
    if engine.is_null() {
        return MotionStatus::NullPointer;
    }
    if !(x.is_finite() && y.is_finite() && z.is_finite()) {
        return MotionStatus::InvalidParameter;
    }

    let engine = &mut *engine;
    let steps_before = engine.pipeline.step_count();

    let result = engine.pipeline.process_sample(&MotionSample::new(x, y, z, timestamp_ms));

    if !output.is_null() {
        let output = &mut *output;
        output.timestamp_ms = timestamp_ms;
        output.step_count = engine.pipeline.step_count();
        output.activity_type = activity_code(engine.pipeline.activity_type());
        output.avg_magnitude = engine.pipeline.avg_magnitude();
        output.step_detected = i32::from(engine.pipeline.step_count() != steps_before);
        output.fall_detected = i32::from(result.events.iter().any(MotionEvent::is_fall));
        output.update_emitted = i32::from(result.events.iter().any(|e| !e.is_fall()));
    }

    engine.pending_events.extend(result.events);
    engine.pending_notifications.extend(result.notifications);

    MotionStatus::Ok
}

// ============================================================================
// JSON OUTPUT
// ============================================================================

/// Take every queued event as a JSON array of channel maps.
///
/// # Safety
/// - `engine` must be a valid pointer.
///
/// # Returns
/// - JSON string (MUST be freed with `motion_free_string()`).
/// - NULL if `engine` is NULL.
#[no_mangle]
pub unsafe extern "C" fn motion_engine_take_events_json(engine: *mut MotionEngine) -> *mut c_char {
    if engine.is_null() {
        return ptr::null_mut();
    }

    let engine = &mut *engine;
    let events: Vec<Value> = engine.pending_events.drain(..).map(|e| encode_motion_event(&e)).collect();
    into_c_string(Value::Array(events))
}

/// Take every queued notification as a JSON array.
///
/// # Safety
/// - `engine` must be a valid pointer.
///
/// # Returns
/// - JSON string (MUST be freed with `motion_free_string()`).
/// - NULL if `engine` is NULL.
#[no_mangle]
pub unsafe extern "C" fn motion_engine_take_notifications_json(engine: *mut MotionEngine) -> *mut c_char {
    if engine.is_null() {
        return ptr::null_mut();
    }

    let engine = &mut *engine;
    let notifications: Vec<Value> = engine
        .pending_notifications
        .drain(..)
        .map(|n| notification_json(&n))
        .collect();
    into_c_string(Value::Array(notifications))
}

/// Free a string returned by this library.
///
/// # Safety
/// - `ptr` must come from this library, or be NULL.
#[no_mangle]
pub unsafe extern "C" fn motion_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// STATUS QUERIES
// ============================================================================

/// Get the session step count, or -1 for a NULL engine.
///
/// # Safety
/// - `engine` must be a valid pointer or NULL.
#[no_mangle]
pub unsafe extern "C" fn motion_engine_step_count(engine: *const MotionEngine) -> i64 {
    if engine.is_null() {
        return -1;
    }
    i64::from((*engine).pipeline.step_count())
}

/// Library version string. Static; do not free.
#[no_mangle]
pub extern "C" fn motion_version() -> *const c_char {
    static VERSION: &[u8] = concat!("stride-sense/", env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    unsafe fn take_json(ptr: *mut c_char) -> Value {
        assert!(!ptr.is_null());
        let value = serde_json::from_str(CStr::from_ptr(ptr).to_str().unwrap()).unwrap();
        motion_free_string(ptr);
        value
    }

    #[test]
    fn test_engine_lifecycle() {
        unsafe {
            let engine = motion_engine_create(ptr::null());
            assert!(!engine.is_null());

            let start = CString::new("start").unwrap();
            assert_eq!(motion_engine_control(engine, start.as_ptr()), MotionStatus::Ok);

            let bogus = CString::new("pause").unwrap();
            assert_eq!(motion_engine_control(engine, bogus.as_ptr()), MotionStatus::InvalidParameter);

            motion_engine_destroy(engine);
        }
    }

    #[test]
    fn test_sample_processing() {
        unsafe {
            let engine = motion_engine_create(ptr::null());
            let mut output = MotionSampleOutput::default();

            let status = motion_engine_process_sample(engine, 0, 0.0, 0.0, 5.0, &mut output);
            assert_eq!(status, MotionStatus::Ok);
            let status = motion_engine_process_sample(engine, 20, 0.0, 0.0, 13.0, &mut output);
            assert_eq!(status, MotionStatus::Ok);
            assert_eq!(output.step_detected, 1);
            assert_eq!(output.update_emitted, 0);

            motion_engine_process_sample(engine, 40, 0.0, 0.0, 11.0, &mut output);
            assert_eq!(output.timestamp_ms, 40);
            assert_eq!(output.step_detected, 0);
            assert_eq!(output.update_emitted, 1);
            assert_eq!(motion_engine_step_count(engine), 1);

            let events = take_json(motion_engine_take_events_json(engine));
            assert_eq!(events.as_array().unwrap().len(), 1);
            assert_eq!(events[0]["stepCount"], 1);
            assert_eq!(events[0]["activityType"], "stationary");

            let events = take_json(motion_engine_take_events_json(engine));
            assert!(events.as_array().unwrap().is_empty());

            motion_engine_destroy(engine);
        }
    }

    #[test]
    fn test_fall_queues_notification() {
        unsafe {
            let engine = motion_engine_create(ptr::null());
            let mut output = MotionSampleOutput::default();

            motion_engine_process_sample(engine, 1000, 0.0, 0.0, 30.0, &mut output);
            assert_eq!(output.fall_detected, 1);

            let notifications = take_json(motion_engine_take_notifications_json(engine));
            assert_eq!(notifications[0]["id"], 2);
            assert_eq!(notifications[0]["priority"], "max");
            assert_eq!(notifications[0]["channelId"], "fitness_notifications");
            assert_eq!(notifications[0]["channelName"], CHANNEL_NAME);
            assert_eq!(notifications[0]["vibrationPattern"], json!([0, 500, 200, 500]));

            let events = take_json(motion_engine_take_events_json(engine));
            assert_eq!(events[0]["type"], "fall_detected");
            assert_eq!(events[0]["timestamp"], 1000);

            motion_engine_destroy(engine);
        }
    }

    #[test]
    fn test_create_from_toml() {
        unsafe {
            let toml = CString::new("emit_every = 1\nstep_goal = 2\n").unwrap();
            let engine = motion_engine_create_from_toml(toml.as_ptr());
            assert!(!engine.is_null());

            for (ts, z) in [(0, 5.0), (1, 13.0), (2, 5.0), (3, 13.0)] {
                motion_engine_process_sample(engine, ts, 0.0, 0.0, z, ptr::null_mut());
            }
            let events = take_json(motion_engine_take_events_json(engine));
            assert_eq!(events.as_array().unwrap().len(), 4);
            let notifications = take_json(motion_engine_take_notifications_json(engine));
            assert_eq!(notifications[0]["id"], 1);

            motion_engine_destroy(engine);

            let invalid = CString::new("emit_every = 0\n").unwrap();
            assert!(motion_engine_create_from_toml(invalid.as_ptr()).is_null());
        }
    }

    #[test]
    fn test_version() {
        let version = motion_version();
        assert!(!version.is_null());

        unsafe {
            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(version_str.starts_with("stride-sense/"));
        }
    }

    #[test]
    fn test_null_safety() {
        unsafe {
            assert_eq!(motion_engine_control(ptr::null_mut(), ptr::null()), MotionStatus::NullPointer);

            let status = motion_engine_process_sample(ptr::null_mut(), 0, 0.0, 0.0, 9.81, ptr::null_mut());
            assert_eq!(status, MotionStatus::NullPointer);

            assert!(motion_engine_take_events_json(ptr::null_mut()).is_null());
            assert!(motion_engine_create_from_toml(ptr::null()).is_null());
            assert_eq!(motion_engine_step_count(ptr::null()), -1);
            motion_free_string(ptr::null_mut());
        }
    }

    #[test]
    fn test_non_finite_rejected() {
        unsafe {
            let engine = motion_engine_create(ptr::null());
            let status = motion_engine_process_sample(engine, 0, f32::NAN, 0.0, 0.0, ptr::null_mut());
            assert_eq!(status, MotionStatus::InvalidParameter);
            motion_engine_destroy(engine);
        }
    }
}
