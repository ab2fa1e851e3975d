//! Keeps displayed entities aligned with the viewport without
//! refetching on every pixel of movement.
//!
//! Settle events are debounced (a burst collapses into one evaluation),
//! quantized bounds dedupe repeat viewports, and a significance gate
//! drops trivial nudges. Every issued fetch carries an epoch; a
//! response applies only while its epoch is still the latest, which
//! holds under arbitrary network reordering. The controller is
//! poll-driven: the embedding loop calls [`ViewportFetchController::poll`]
//! with the current time, so behaviour is deterministic under test.

use crate::{
    core::{
        config::FetchConfig,
        geo::{significant_change, BoundsKey, LatLngBounds},
    },
    prelude::Instant,
    search::SearchPage,
};

/// A qualifying viewport fetch the caller should now issue
#[derive(Debug, Clone, PartialEq)]
pub struct FetchPlan {
    pub epoch: u64,
    pub bounds: LatLngBounds,
}

/// What happened to a completed fetch
#[derive(Debug)]
pub enum FetchOutcome {
    /// The response is current and should be rendered
    Applied(SearchPage),
    /// A newer request superseded this one; discard silently
    Stale,
    /// The fetch failed; displayed entities stay untouched
    Failed(Box<dyn std::error::Error + Send + Sync>),
}

pub struct ViewportFetchController {
    config: FetchConfig,
    pending: Option<(LatLngBounds, Instant)>,
    last_key: Option<BoundsKey>,
    last_bounds: Option<LatLngBounds>,
    epoch: u64,
    closed: bool,
}

impl ViewportFetchController {
    pub fn new(config: FetchConfig) -> Self {
        Self {
            config,
            pending: None,
            last_key: None,
            last_bounds: None,
            epoch: 0,
            closed: false,
        }
    }

    pub fn current_epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Records a settle event. Bursts collapse: the newest bounds
    /// replace any pending ones and the debounce deadline restarts.
    pub fn note_settle(&mut self, bounds: LatLngBounds, now: Instant) {
        if self.closed {
            return;
        }
        self.pending = Some((bounds, now + self.config.debounce));
    }

    /// Evaluates the pending settle once its debounce deadline passes.
    /// Returns a plan only when the viewport is new (by quantized key)
    /// and the movement is significant.
    pub fn poll(&mut self, now: Instant) -> Option<FetchPlan> {
        if self.closed {
            return None;
        }
        match &self.pending {
            Some((_, deadline)) if now >= *deadline => {}
            _ => return None,
        }
        let (bounds, _) = self.pending.take()?;

        let key = BoundsKey::quantize(&bounds, self.config.bounds_precision);
        if self.last_key == Some(key) {
            return None;
        }
        if let Some(previous) = &self.last_bounds {
            if !significant_change(previous, &bounds, self.config.significance_threshold) {
                return None;
            }
        }

        self.epoch += 1;
        self.last_key = Some(key);
        self.last_bounds = Some(bounds.clone());
        Some(FetchPlan {
            epoch: self.epoch,
            bounds,
        })
    }

    /// Applies a completed fetch under the epoch check
    pub fn complete(
        &mut self,
        epoch: u64,
        result: crate::Result<SearchPage>,
    ) -> FetchOutcome {
        if self.closed || epoch != self.epoch {
            return FetchOutcome::Stale;
        }
        match result {
            Ok(page) => FetchOutcome::Applied(page),
            Err(error) => FetchOutcome::Failed(error),
        }
    }

    /// Cancels the pending debounce and fences off every in-flight
    /// response. Nothing can apply after teardown.
    pub fn teardown(&mut self) {
        self.closed = true;
        self.pending = None;
        self.epoch = u64::MAX;
    }
}
