//! Thread-safe handle to a [`SafetyLayer`].

use std::sync::Arc;

use crate::config::SafetyConfig;
use crate::error::SafetyResult;
use crate::layer::SafetyLayer;
use crate::payload::{NormalizedCommand, RawCommand, RawObservation};
use crate::report::{SafetyFault, SafetyReport, SafetyState};

/// Cloneable handle that serializes access to one [`SafetyLayer`].
///
/// Every clone drives the same supervisor, so at most one `step` runs at a
/// time no matter how many control paths hold a handle.
#[derive(Debug)]
pub struct SharedSafetyLayer {
    inner: Arc<parking_lot::Mutex<SafetyLayer>>,
}

impl SharedSafetyLayer {
    /// Wrap an existing layer.
    #[must_use]
    pub fn new(layer: SafetyLayer) -> Self {
        Self {
            inner: Arc::new(parking_lot::Mutex::new(layer)),
        }
    }

    /// Build a layer from `config` and wrap it.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not validate.
    pub fn from_config(config: SafetyConfig) -> SafetyResult<Self> {
        SafetyLayer::new(config).map(Self::new)
    }

    /// Run one cycle. See [`SafetyLayer::step`].
    pub fn step(
        &self,
        t: f64,
        obs: &RawObservation,
        cmd: &RawCommand,
    ) -> (NormalizedCommand, SafetyReport) {
        self.inner.lock().step(t, obs, cmd)
    }

    /// Reset the layer. See [`SafetyLayer::reset`].
    pub fn reset(&self, reason: &str) {
        self.inner.lock().reset(reason);
    }

    /// Check if the layer is killed.
    #[must_use]
    pub fn is_killed(&self) -> bool {
        self.inner.lock().is_killed()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SafetyState {
        self.inner.lock().state()
    }

    /// Fault that latched the kill.
    #[must_use]
    pub fn latched_fault(&self) -> Option<SafetyFault> {
        self.inner.lock().latched_fault()
    }

    /// Run `f` with exclusive access to the layer.
    pub fn with_layer<R>(&self, f: impl FnOnce(&mut SafetyLayer) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

impl Clone for SharedSafetyLayer {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
