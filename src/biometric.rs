//! Biometric authentication boundary.
//!
//! The platform prompt is a one-shot async operation. Internally the result
//! keeps its cause (`AuthOutcome`) so callers and tests can tell a cancel
//! from a lockout; the application-facing surface still collapses it to a
//! boolean.
//!
//! Only one prompt may be outstanding. A second request while the first is
//! on screen is rejected with `AuthenticationInProgress` instead of being
//! queued behind it.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::{Result, StrideError};

/// Terminal result of one biometric prompt.
///
/// Individual unrecognized attempts are not terminal: the user may retry
/// inside the same prompt, so `Failed` is only reported when the platform
/// gives up on the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AuthOutcome {
    Succeeded,
    Failed,
    /// The user dismissed the prompt or pressed the negative button.
    Cancelled,
    /// No enrolled biometrics or no sensor.
    HardwareUnavailable,
    /// Too many attempts.
    LockedOut,
    /// Any other platform error.
    Error { code: i32, message: String },
}

impl AuthOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AuthOutcome::Succeeded)
    }
}

/// Text and policy for the prompt dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptInfo {
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub negative_button: String,
    /// Restrict to strong (class 3) biometrics.
    pub strong_only: bool,
}

impl Default for PromptInfo {
    fn default() -> Self {
        Self {
            title: "Biometric authentication".to_string(),
            subtitle: "Use your fingerprint".to_string(),
            description: "Place your finger on the sensor".to_string(),
            negative_button: "Cancel".to_string(),
            strong_only: true,
        }
    }
}

/// Host biometric API.
#[async_trait]
pub trait BiometricAuthenticator: Send + Sync {
    /// Whether the device can authenticate at the requested strength.
    fn can_authenticate(&self, strong_only: bool) -> bool;

    /// Show the prompt and resolve once it reaches a terminal outcome.
    async fn prompt(&self, info: &PromptInfo) -> AuthOutcome;
}

/// Serializes access to the host authenticator.
pub struct BiometricGate {
    authenticator: Arc<dyn BiometricAuthenticator>,
    prompt: PromptInfo,
    pending: Mutex<()>,
}

impl BiometricGate {
    pub fn new(authenticator: Arc<dyn BiometricAuthenticator>) -> Self {
        Self::with_prompt(authenticator, PromptInfo::default())
    }

    pub fn with_prompt(authenticator: Arc<dyn BiometricAuthenticator>, prompt: PromptInfo) -> Self {
        Self {
            authenticator,
            prompt,
            pending: Mutex::new(()),
        }
    }

    pub fn check_biometric_support(&self) -> bool {
        self.authenticator.can_authenticate(self.prompt.strong_only)
    }

    /// Run one prompt and keep the cause of the result.
    pub async fn authenticate_detailed(&self) -> Result<AuthOutcome> {
        let _guard = self
            .pending
            .try_lock()
            .map_err(|_| StrideError::AuthenticationInProgress)?;

        tracing::debug!(title = %self.prompt.title, "Showing biometric prompt");
        let outcome = self.authenticator.prompt(&self.prompt).await;

        if outcome.is_success() {
            tracing::info!("Biometric authentication succeeded");
        } else {
            tracing::info!(outcome = ?outcome, "Biometric authentication did not succeed");
        }
        Ok(outcome)
    }

    /// True only on success. Every failure cause, including a rejected
    /// concurrent request, collapses to false.
    pub async fn authenticate(&self) -> bool {
        match self.authenticate_detailed().await {
            Ok(outcome) => outcome.is_success(),
            Err(err) => {
                tracing::warn!(error = %err, "Biometric request rejected");
                false
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.try_lock().is_err()
    }
}
