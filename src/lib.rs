//! Stride Sense motion library
//!
//! Turns a stream of raw 3-axis accelerometer samples into a step count, a
//! smoothed activity label and discrete fall alerts, and relays GPS fixes
//! and biometric prompts for a mobile fitness tracker.
//!
//! # Design Philosophy
//!
//! - **Fixed, named thresholds**: every tuning value is a constant with a
//!   matching config field, never a magic number inside an algorithm.
//! - **One owner per session**: all mutable motion state lives in one
//!   `MotionPipeline`, driven by one task; samples and control commands are
//!   serialized through the same bounded queue.
//! - **Host behind traits**: sensors, location, permissions, notifications
//!   and biometric prompts are traits so the core runs headless.
//!
//! # Example
//!
//! ```
//! use stride_sense::pipeline::{MotionPipeline, PipelineConfig};
//! use stride_sense::types::MotionSample;
//!
//! let mut pipeline = MotionPipeline::new(PipelineConfig::default());
//! for (i, z) in [5.0, 13.0, 11.0, 14.0, 9.0].into_iter().enumerate() {
//!     pipeline.process_sample(&MotionSample::new(0.0, 0.0, z, i as i64 * 20));
//! }
//! assert_eq!(pipeline.step_count(), 2);
//! ```

pub mod activity;
pub mod biometric;
pub mod channel;
pub mod error;
pub mod fall_detection;
pub mod ffi;
pub mod location;
pub mod notify;
pub mod pipeline;
pub mod signal;
pub mod step_detection;
pub mod stream;
pub mod types;


// Re-export commonly used types
pub use error::{Result, StrideError};
pub use pipeline::{ControlCommand, ControlState, MotionPipeline, MotionState, PipelineConfig};
pub use stream::{MotionController, MotionSubscription, SampleSink, SensorSource};
pub use types::{ActivityType, LocationFix, MotionEvent, MotionSample};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
