//! Observer traits for receiving outcomes.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{LocationError, Outcome, Payload, Position};

static NEXT_OBSERVER: AtomicU64 = AtomicU64::new(1);

/// Identifies an attached observer. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl ObserverId {
    /// Allocate a fresh id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_OBSERVER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer#{}", self.0)
    }
}

/// Receives every published outcome.
pub trait Observer: Send + Sync {
    /// Called with the latest outcome.
    fn on_changed(&self, outcome: &Arc<Outcome>);
}

impl<F> Observer for F
where
    F: Fn(&Arc<Outcome>) + Send + Sync,
{
    fn on_changed(&self, outcome: &Arc<Outcome>) {
        self(outcome);
    }
}

/// Split callbacks for successes and failures.
///
/// Wrap in [`Handled`] to attach it.
pub trait LocationObserver: Send + Sync {
    /// A new fix arrived.
    fn on_success(&self, position: &Position);

    /// A failure nobody handled yet arrived.
    fn on_failure(&self, error: &LocationError);
}

/// Adapts a [`LocationObserver`] into an [`Observer`].
///
/// Successes are always delivered. A failure is delivered only if no other
/// observer consumed it first, so one specialized observer can claim an
/// error and keep the rest from handling it again.
#[derive(Debug, Clone)]
pub struct Handled<O>(pub O);

impl<O: LocationObserver> Observer for Handled<O> {
    fn on_changed(&self, outcome: &Arc<Outcome>) {
        if outcome.is_success() {
            if let Some(position) = outcome.position() {
                self.0.on_success(position);
            }
            return;
        }
        if let Some(Payload::Failure(error)) = outcome.try_consume() {
            self.0.on_failure(error);
        }
    }
}
