//! Platform-channel surface.
//!
//! The host bridge forwards method calls as JSON (`{"method": ..,
//! "arguments": ..}`) and pushes stream events as JSON maps. This module
//! routes calls to the biometric gate, the location service and the motion
//! control queue, and encodes events with the map keys the application
//! layer already reads.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::biometric::BiometricGate;
use crate::error::{Result, StrideError};
use crate::location::LocationService;
use crate::pipeline::ControlCommand;
use crate::stream::MotionController;
use crate::types::{LocationFix, MotionEvent};

pub const BIOMETRIC_CHANNEL: &str = "com.tuinstituto.fitness/biometric";
pub const ACCELEROMETER_CHANNEL: &str = "com.tuinstituto.fitness/accelerometer";
pub const ACCELEROMETER_CONTROL_CHANNEL: &str = "com.tuinstituto.fitness/accelerometer/control";
pub const GPS_CHANNEL: &str = "com.tuinstituto.fitness/gps";
pub const GPS_STREAM_CHANNEL: &str = "com.tuinstituto.fitness/gps/stream";

/// Incoming method invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            arguments: Value::Null,
        }
    }
}

/// Reply to a method invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MethodResponse {
    Success { value: Value },
    Error { code: String, message: String },
    NotImplemented,
}

impl MethodResponse {
    pub fn success(value: impl Into<Value>) -> Self {
        MethodResponse::Success { value: value.into() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, MethodResponse::Success { .. })
    }
}

impl From<StrideError> for MethodResponse {
    fn from(err: StrideError) -> Self {
        MethodResponse::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

// ============================================================================
// EVENT ENCODING
// ============================================================================

/// An event ready to be pushed on a stream channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventMessage {
    pub channel: &'static str,
    pub payload: Value,
}

impl EventMessage {
    /// Motion update or fall alert for the accelerometer stream.
    pub fn motion(event: &MotionEvent) -> Self {
        Self {
            channel: ACCELEROMETER_CHANNEL,
            payload: encode_motion_event(event),
        }
    }

    /// Fix for the GPS stream.
    pub fn location(fix: &LocationFix) -> Self {
        Self {
            channel: GPS_STREAM_CHANNEL,
            payload: encode_location_fix(fix),
        }
    }

    /// Terminal error for the GPS stream, e.g. a denied subscription.
    pub fn location_error(err: &StrideError) -> Self {
        Self {
            channel: GPS_STREAM_CHANNEL,
            payload: encode_stream_error(err),
        }
    }
}

/// Encode a motion event as the map delivered on the accelerometer stream.
pub fn encode_motion_event(event: &MotionEvent) -> Value {
    match event {
        MotionEvent::MotionUpdate {
            step_count,
            activity_type,
            avg_magnitude,
        } => json!({
            "stepCount": step_count,
            "activityType": activity_type.as_str(),
            "magnitude": avg_magnitude,
        }),
        MotionEvent::FallDetected { magnitude, timestamp_ms } => json!({
            "type": "fall_detected",
            "magnitude": magnitude,
            "timestamp": timestamp_ms,
        }),
    }
}

/// Encode a fix as the map delivered on the GPS stream.
pub fn encode_location_fix(fix: &LocationFix) -> Value {
    json!({
        "latitude": fix.latitude,
        "longitude": fix.longitude,
        "altitude": fix.altitude,
        "speed": fix.speed_mps,
        "accuracy": fix.accuracy_meters,
        "timestamp": fix.timestamp_ms,
    })
}

/// Terminal error delivered on a stream before it closes.
pub fn encode_stream_error(err: &StrideError) -> Value {
    json!({
        "code": err.code(),
        "message": err.to_string(),
    })
}

// ============================================================================
// ROUTER
// ============================================================================

/// Routes method calls by channel name.
///
/// Every backend is optional; calls to a channel whose backend was never
/// attached answer `NotImplemented`, except accelerometer control, which
/// succeeds as a no-op while no session is listening.
#[derive(Default)]
pub struct ChannelRouter {
    biometric: Option<Arc<BiometricGate>>,
    location: Option<LocationService>,
    motion: RwLock<Option<MotionController>>,
}

impl ChannelRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_biometric(mut self, gate: Arc<BiometricGate>) -> Self {
        self.biometric = Some(gate);
        self
    }

    pub fn with_location(mut self, service: LocationService) -> Self {
        self.location = Some(service);
        self
    }

    /// Point control calls at the current listening session.
    pub fn attach_motion(&self, controller: MotionController) {
        *self.motion.write() = Some(controller);
    }

    /// Called when the accelerometer stream is cancelled.
    pub fn detach_motion(&self) {
        *self.motion.write() = None;
    }

    pub async fn handle(&self, channel: &str, call: &MethodCall) -> MethodResponse {
        tracing::debug!(channel, method = %call.method, "Method call");
        match channel {
            BIOMETRIC_CHANNEL => self.handle_biometric(call).await,
            GPS_CHANNEL => self.handle_gps(call),
            ACCELEROMETER_CONTROL_CHANNEL => self.handle_control(call).await,
            _ => MethodResponse::NotImplemented,
        }
    }

    /// Decode a JSON call, route it and encode the reply.
    pub async fn handle_json(&self, channel: &str, payload: &str) -> Result<String> {
        let response = match serde_json::from_str::<MethodCall>(payload) {
            Ok(call) => self.handle(channel, &call).await,
            Err(err) => {
                tracing::warn!(channel, error = %err, "Malformed method call");
                MethodResponse::from(StrideError::from(err))
            }
        };
        Ok(serde_json::to_string(&response)?)
    }

    async fn handle_biometric(&self, call: &MethodCall) -> MethodResponse {
        let Some(gate) = &self.biometric else {
            return MethodResponse::NotImplemented;
        };
        match call.method.as_str() {
            "checkBiometricSupport" => MethodResponse::success(gate.check_biometric_support()),
            "authenticate" => MethodResponse::success(gate.authenticate().await),
            _ => MethodResponse::NotImplemented,
        }
    }

    fn handle_gps(&self, call: &MethodCall) -> MethodResponse {
        let Some(location) = &self.location else {
            return MethodResponse::NotImplemented;
        };
        match call.method.as_str() {
            "isGpsEnabled" => MethodResponse::success(location.is_gps_enabled()),
            "requestPermissions" => MethodResponse::success(location.request_permissions()),
            "getCurrentLocation" => match location.get_current_location() {
                Ok(fix) => MethodResponse::success(encode_location_fix(&fix)),
                Err(err) => err.into(),
            },
            _ => MethodResponse::NotImplemented,
        }
    }

    async fn handle_control(&self, call: &MethodCall) -> MethodResponse {
        let command = match call.method.parse::<ControlCommand>() {
            Ok(command) => command,
            Err(_) => return MethodResponse::NotImplemented,
        };

        let controller = self.motion.read().clone();
        let Some(controller) = controller else {
            tracing::debug!(command = %command, "Control call with no active session");
            return MethodResponse::success(Value::Null);
        };

        match controller.send(command).await {
            Ok(state) => {
                tracing::info!(command = %command, state = ?state, "Control command applied");
            }
            Err(StrideError::StreamClosed) => {
                tracing::debug!(command = %command, "Control call after session ended");
            }
            Err(err) => return err.into(),
        }
        MethodResponse::success(Value::Null)
    }
}
