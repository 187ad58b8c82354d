//! Latest-value broadcast to a dynamic set of observers.

use std::fmt;
use std::sync::Arc;

use crate::{ObserverId, Outcome, observer::Observer};

/// How attaching or detaching changed the observer count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The first observer attached.
    Activated,
    /// The last observer detached.
    Deactivated,
    /// The count changed without crossing zero, or nothing changed.
    Unchanged,
}

/// Holds the latest outcome and replays it to observers as they attach.
#[derive(Default)]
pub struct Distribution {
    latest: Option<Arc<Outcome>>,
    observers: Vec<(ObserverId, Arc<dyn Observer>)>,
}

impl Distribution {
    /// An empty distribution with no value.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `observer` and replay the latest value to it.
    ///
    /// Attaching an id twice is ignored.
    pub fn subscribe(&mut self, id: ObserverId, observer: Arc<dyn Observer>) -> Transition {
        if self.contains(id) {
            return Transition::Unchanged;
        }
        self.observers.push((id, observer.clone()));
        if let Some(latest) = &self.latest {
            observer.on_changed(latest);
        }
        if self.observers.len() == 1 {
            Transition::Activated
        } else {
            Transition::Unchanged
        }
    }

    /// Detach `id`.
    pub fn unsubscribe(&mut self, id: ObserverId) -> Transition {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        if before > 0 && self.observers.is_empty() {
            Transition::Deactivated
        } else {
            Transition::Unchanged
        }
    }

    /// Store `outcome` as the latest value and hand it to every observer in
    /// attachment order.
    pub fn publish(&mut self, outcome: Outcome) -> Arc<Outcome> {
        let outcome = Arc::new(outcome);
        self.latest = Some(outcome.clone());
        for (_, observer) in &self.observers {
            observer.on_changed(&outcome);
        }
        outcome
    }

    /// The latest published outcome.
    #[must_use]
    pub const fn latest(&self) -> Option<&Arc<Outcome>> {
        self.latest.as_ref()
    }

    /// Number of attached observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Whether no observer is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Whether `id` is attached.
    #[must_use]
    pub fn contains(&self, id: ObserverId) -> bool {
        self.observers.iter().any(|(existing, _)| *existing == id)
    }
}

impl fmt::Debug for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Distribution")
            .field("latest", &self.latest)
            .field("observers", &self.observers.len())
            .finish()
    }
}
