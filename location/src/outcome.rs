//! The value pushed to observers.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::{ErrorType, LocationError, Position};

/// What a location attempt produced.
#[derive(Debug, Clone)]
pub enum Payload {
    /// A location fix.
    Success(Position),
    /// A classified failure.
    Failure(LocationError),
}

/// The immutable outcome of a location attempt, plus a single "consumed"
/// flag.
///
/// The flag lives on the value, not on any observer. Every observer that
/// receives the same `Outcome` shares it, so "first reader wins": whichever
/// observer consumes the payload first flips the flag for everybody. When
/// observers run concurrently, which one wins is not deterministic.
#[derive(Debug)]
pub struct Outcome {
    payload: Payload,
    consumed: AtomicBool,
}

impl Outcome {
    /// A successful outcome.
    #[must_use]
    pub const fn success(position: Position) -> Self {
        Self {
            payload: Payload::Success(position),
            consumed: AtomicBool::new(false),
        }
    }

    /// A failed outcome.
    #[must_use]
    pub const fn failure(error: LocationError) -> Self {
        Self {
            payload: Payload::Failure(error),
            consumed: AtomicBool::new(false),
        }
    }

    /// Whether this outcome carries a position.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.payload, Payload::Success(_))
    }

    /// Read the payload without marking it consumed.
    #[must_use]
    pub const fn peek(&self) -> &Payload {
        &self.payload
    }

    /// Read the error classification without marking it consumed.
    #[must_use]
    pub const fn peek_error_type(&self) -> Option<ErrorType> {
        match &self.payload {
            Payload::Success(_) => None,
            Payload::Failure(error) => Some(error.kind()),
        }
    }

    /// Read the payload and mark it consumed.
    ///
    /// Repeated calls return the same payload; only the first flips the flag.
    pub fn consume(&self) -> &Payload {
        self.consumed.store(true, Ordering::Release);
        &self.payload
    }

    /// Read the payload only if nobody consumed it yet.
    ///
    /// Exactly one caller over the lifetime of the outcome gets `Some`.
    pub fn try_consume(&self) -> Option<&Payload> {
        if self.consumed.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(&self.payload)
        }
    }

    /// The position, marking the outcome consumed. `None` for failures.
    pub fn position(&self) -> Option<&Position> {
        match self.consume() {
            Payload::Success(position) => Some(position),
            Payload::Failure(_) => None,
        }
    }

    /// The error, marking the outcome consumed. `None` for successes.
    pub fn error(&self) -> Option<&LocationError> {
        match self.consume() {
            Payload::Success(_) => None,
            Payload::Failure(error) => Some(error),
        }
    }

    /// Whether any reader consumed the payload.
    #[must_use]
    pub fn is_consumed(&self) -> bool {
        self.consumed.load(Ordering::Acquire)
    }
}
