//! The position provider capability and the sink it streams into.

use std::fmt;

use async_channel::Sender;
use futures::future::BoxFuture;
use log::warn;

use crate::{LocationRequest, Position, ProviderError};

/// Identifies one start of the provider stream.
///
/// Callbacks tagged with an epoch other than the current one come from a
/// stream the controller already stopped and are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamEpoch(pub(crate) u64);

/// Something the provider stream reported.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A new fix.
    Position(Position),
    /// The provider can no longer produce fixes with the current settings.
    Unavailable,
}

/// A stream callback, tagged with the stream it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamMessage {
    /// The stream that produced the event.
    pub epoch: StreamEpoch,
    /// The event.
    pub event: StreamEvent,
}

/// Handle a [`PositionSource`] uses to push stream callbacks back to the
/// controller's task.
#[derive(Clone)]
pub struct StreamSink {
    epoch: StreamEpoch,
    sender: Sender<StreamMessage>,
}

impl StreamSink {
    pub(crate) const fn new(epoch: StreamEpoch, sender: Sender<StreamMessage>) -> Self {
        Self { epoch, sender }
    }

    /// The stream this sink belongs to.
    #[must_use]
    pub const fn epoch(&self) -> StreamEpoch {
        self.epoch
    }

    /// Deliver a new fix.
    pub fn position(&self, position: Position) {
        self.send(StreamEvent::Position(position));
    }

    /// Report that fixes are no longer available.
    pub fn unavailable(&self) {
        self.send(StreamEvent::Unavailable);
    }

    /// Deliver an arbitrary stream event.
    pub fn send(&self, event: StreamEvent) {
        let message = StreamMessage {
            epoch: self.epoch,
            event,
        };
        if let Err(err) = self.sender.try_send(message) {
            warn!("dropping location stream event: {err}");
        }
    }

    /// Whether the controller's task is gone.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl fmt::Debug for StreamSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSink")
            .field("epoch", &self.epoch)
            .finish()
    }
}

/// The external location provider.
///
/// Only the controller starts or stops streams. Each stream is named by the
/// epoch of its [`StreamSink`]. A stream abandoned while its start is in
/// flight is stopped once the start succeeds, so a short overlap with its
/// replacement is possible.
pub trait PositionSource: Send + Sync {
    /// Fetch the last known fix, if the provider has one.
    fn fetch_last_known(&self) -> BoxFuture<'static, Result<Option<Position>, ProviderError>>;

    /// Start streaming fixes for `request` into `sink`.
    ///
    /// Resolves once the provider accepted or rejected the subscription.
    fn start_stream(
        &self,
        request: LocationRequest,
        sink: StreamSink,
    ) -> BoxFuture<'static, Result<(), ProviderError>>;

    /// Stop the stream started with `epoch`. Called once for every start
    /// that resolved `Ok`, and never for one that failed. Best effort; no
    /// confirmation is awaited.
    fn stop_stream(&self, epoch: StreamEpoch);
}
