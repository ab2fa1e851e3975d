//! Render-time fault barrier around the map subtree.
//!
//! A retained-mode widget and a reconciling view tree sharing one node
//! produce a known family of harmless child-removal races during fast
//! unmount/remount cycles. Those are recognized by message pattern and
//! absorbed; everything else trips the boundary into a faulted state
//! that suppresses further work on the subtree until the child identity
//! changes (e.g. switching between list view and map view).

use crate::MapError;

type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Message fragments of known-harmless widget/view-tree interop races
const INTEROP_NOISE: &[&str] = &["removeChild", "insertBefore", "not a child of this node"];

#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryState {
    Healthy,
    Faulted { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    Ignorable,
    Fatal,
}

/// Classifies an error against the known interop-noise patterns
pub fn classify(error: &BoxedError) -> FaultClass {
    if let Some(MapError::DomInterop(_)) = error.downcast_ref::<MapError>() {
        return FaultClass::Ignorable;
    }
    let message = error.to_string();
    if INTEROP_NOISE.iter().any(|needle| message.contains(needle)) {
        FaultClass::Ignorable
    } else {
        FaultClass::Fatal
    }
}

pub struct FaultBoundary {
    state: BoundaryState,
    child_key: Option<u64>,
}

impl FaultBoundary {
    pub fn new() -> Self {
        Self {
            state: BoundaryState::Healthy,
            child_key: None,
        }
    }

    pub fn state(&self) -> &BoundaryState {
        &self.state
    }

    pub fn is_faulted(&self) -> bool {
        matches!(self.state, BoundaryState::Faulted { .. })
    }

    /// Static fallback copy shown while faulted
    pub fn fallback_message(&self) -> Option<String> {
        match &self.state {
            BoundaryState::Faulted { reason } => {
                Some(format!("map temporarily unavailable: {reason}"))
            }
            BoundaryState::Healthy => None,
        }
    }

    /// Resets to healthy when the child subtree identity changes
    pub fn reset_for_child(&mut self, key: u64) {
        if self.child_key != Some(key) {
            self.child_key = Some(key);
            self.state = BoundaryState::Healthy;
        }
    }

    /// Routes an error through classification. Ignorable errors leave
    /// the boundary healthy; fatal ones fault it.
    pub fn absorb(&mut self, context: &str, error: BoxedError) {
        match classify(&error) {
            FaultClass::Ignorable => {
                log::debug!("ignoring interop noise during {context}: {error}");
            }
            FaultClass::Fatal => {
                if cfg!(debug_assertions) {
                    log::warn!("fault during {context}: {error}");
                }
                self.state = BoundaryState::Faulted {
                    reason: error.to_string(),
                };
            }
        }
    }

    /// Runs `work` unless faulted, absorbing any error it returns
    pub fn guard<T>(&mut self, context: &str, work: impl FnOnce() -> crate::Result<T>) -> Option<T> {
        if self.is_faulted() {
            return None;
        }
        match work() {
            Ok(value) => Some(value),
            Err(error) => {
                self.absorb(context, error);
                None
            }
        }
    }
}

impl Default for FaultBoundary {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer_err(message: &str) -> BoxedError {
        MapError::Layer(message.to_string()).into()
    }

    #[test]
    fn test_interop_noise_stays_healthy() {
        let mut boundary = FaultBoundary::new();
        boundary.absorb(
            "render",
            layer_err("Failed to execute 'removeChild' on 'Node'"),
        );
        assert!(!boundary.is_faulted());

        boundary.absorb("render", MapError::DomInterop("race on host node".into()).into());
        assert!(!boundary.is_faulted());
    }

    #[test]
    fn test_unexpected_error_faults() {
        let mut boundary = FaultBoundary::new();
        boundary.absorb("render", layer_err("widget exploded"));
        assert!(boundary.is_faulted());
        assert!(boundary
            .fallback_message()
            .unwrap()
            .contains("temporarily unavailable"));
    }

    #[test]
    fn test_faulted_boundary_skips_work() {
        let mut boundary = FaultBoundary::new();
        boundary.absorb("render", layer_err("widget exploded"));

        let mut ran = false;
        let outcome = boundary.guard("render", || {
            ran = true;
            Ok(())
        });
        assert!(outcome.is_none());
        assert!(!ran);
    }

    #[test]
    fn test_child_identity_change_resets() {
        let mut boundary = FaultBoundary::new();
        boundary.reset_for_child(1);
        boundary.absorb("render", layer_err("widget exploded"));
        assert!(boundary.is_faulted());

        // Same child stays faulted
        boundary.reset_for_child(1);
        assert!(boundary.is_faulted());

        // New child heals the boundary
        boundary.reset_for_child(2);
        assert!(!boundary.is_faulted());
    }
}
