//! Location relay.
//!
//! Two surfaces over the platform location provider:
//! - one-shot queries (`LocationService`): provider status, permission
//!   request, last known fix with a GPS → network fallback
//! - a fix stream (`LocationSubscription`): gated by permission at
//!   subscribe time, then a pass-through of every fix the provider reports
//!
//! Fixes are never filtered, deduplicated or smoothed here.

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::mpsc;

use crate::error::{Result, StrideError};
use crate::stream::BoundedSink;
use crate::types::LocationFix;

/// Platform location providers the bridge consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Gps,
    Network,
}

/// Update cadence requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateRequest {
    pub min_interval_ms: u64,
    pub min_distance_m: f32,
}

/// Sink the provider callback pushes fixes into.
pub type FixSink = BoundedSink<LocationFix>;

/// Host permission state for fine location.
pub trait PermissionGate: Send + Sync {
    fn has_location_permission(&self) -> bool;

    /// Ask the user. May return before the user answers.
    fn request_location_permission(&self);
}

/// Host location provider.
pub trait LocationProvider: Send + Sync {
    fn is_provider_enabled(&self, kind: ProviderKind) -> bool;

    /// Last cached fix. `SecurityError` if access is refused at call time.
    fn last_known_location(&self, kind: ProviderKind) -> Result<Option<LocationFix>>;

    /// Start pushing fixes into `sink`.
    fn request_updates(&self, kind: ProviderKind, request: UpdateRequest, sink: FixSink) -> Result<()>;

    /// Stop pushing fixes. No callback may fire after this returns.
    fn remove_updates(&self);
}

/// Configuration for the fix stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LocationStreamConfig {
    pub min_interval_ms: u64,
    pub min_distance_m: f32,
    pub queue_capacity: usize,
}

impl Default for LocationStreamConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 1000,
            min_distance_m: 0.0,
            queue_capacity: 64,
        }
    }
}

// ============================================================================
// ONE-SHOT QUERIES
// ============================================================================

/// One-shot GPS operations.
#[derive(Clone)]
pub struct LocationService {
    provider: Arc<dyn LocationProvider>,
    permissions: Arc<dyn PermissionGate>,
}

impl LocationService {
    pub fn new(provider: Arc<dyn LocationProvider>, permissions: Arc<dyn PermissionGate>) -> Self {
        Self { provider, permissions }
    }

    /// True when the GPS provider is switched on.
    pub fn is_gps_enabled(&self) -> bool {
        self.provider.is_provider_enabled(ProviderKind::Gps)
    }

    /// Returns the grant state after asking, if asking was needed.
    pub fn request_permissions(&self) -> bool {
        if self.permissions.has_location_permission() {
            return true;
        }
        tracing::info!("Requesting location permission");
        self.permissions.request_location_permission();
        self.permissions.has_location_permission()
    }

    /// Last known fix, preferring GPS over the network provider.
    pub fn get_current_location(&self) -> Result<LocationFix> {
        if !self.permissions.has_location_permission() {
            tracing::warn!("Location requested without permission");
            return Err(StrideError::PermissionDenied);
        }

        let fix = match self.provider.last_known_location(ProviderKind::Gps)? {
            Some(fix) => Some(fix),
            None => self.provider.last_known_location(ProviderKind::Network)?,
        };

        fix.ok_or(StrideError::LocationUnavailable)
    }

    pub fn subscribe(&self, config: &LocationStreamConfig) -> Result<LocationSubscription> {
        LocationSubscription::subscribe(Arc::clone(&self.provider), self.permissions.as_ref(), config)
    }
}

// ============================================================================
// FIX STREAM
// ============================================================================

/// An active subscription to GPS fixes.
pub struct LocationSubscription {
    provider: Arc<dyn LocationProvider>,
    sink: FixSink,
    fixes: mpsc::Receiver<LocationFix>,
}

impl LocationSubscription {
    /// Attach to the GPS provider. Without permission this fails with
    /// `PermissionDenied` and the provider is never touched.
    pub fn subscribe(
        provider: Arc<dyn LocationProvider>,
        permissions: &dyn PermissionGate,
        config: &LocationStreamConfig,
    ) -> Result<Self> {
        if !permissions.has_location_permission() {
            tracing::warn!("Location stream refused: permission denied");
            return Err(StrideError::PermissionDenied);
        }

        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let sink = FixSink::new(tx, "gps");
        let request = UpdateRequest {
            min_interval_ms: config.min_interval_ms,
            min_distance_m: config.min_distance_m,
        };

        if let Err(err) = provider.request_updates(ProviderKind::Gps, request, sink.clone()) {
            tracing::warn!(error = %err, "GPS update request failed");
            sink.close();
            return Err(err);
        }

        tracing::info!(min_interval_ms = request.min_interval_ms, "Location stream started");

        Ok(Self {
            provider,
            sink,
            fixes: rx,
        })
    }

    /// Next fix, or `None` once the provider side is gone.
    pub async fn next_fix(&mut self) -> Option<LocationFix> {
        self.fixes.recv().await
    }

    pub fn try_next_fix(&mut self) -> Option<LocationFix> {
        self.fixes.try_recv().ok()
    }

    pub fn dropped_fixes(&self) -> u64 {
        self.sink.dropped()
    }

    /// Detach from the provider before returning.
    pub fn cancel(self) {
        tracing::info!("Location stream cancelled");
        drop(self);
    }
}

impl Drop for LocationSubscription {
    fn drop(&mut self) {
        self.sink.close();
        self.provider.remove_updates();
        self.fixes.close();
    }
}
