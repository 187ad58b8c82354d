//! Device settings checks that gate the start of an update stream.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::LocationRequest;

/// Opaque token for a user-facing action (usually a system dialog) that can
/// bring device settings in line with a request.
///
/// The [`SettingsChecker`] creates it; the host downcasts it to whatever its
/// platform needs, presents it, and reports the outcome back with
/// `report_settings_resolution`.
#[derive(Clone)]
pub struct ResolutionHandle(Arc<dyn Any + Send + Sync>);

impl ResolutionHandle {
    /// Wrap a platform resolution token.
    pub fn new<T: Any + Send + Sync>(token: T) -> Self {
        Self(Arc::new(token))
    }

    /// Borrow the platform token.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl fmt::Debug for ResolutionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionHandle").finish_non_exhaustive()
    }
}

/// What the settings checker reported for a request.
#[derive(Debug, Clone)]
pub enum SettingsStatus {
    /// Settings satisfy the request.
    Satisfied,
    /// Settings can be fixed through the enclosed resolution.
    ResolutionRequired(ResolutionHandle),
    /// Settings cannot be fixed on this device.
    Unavailable,
    /// A status code the controller does not recognize.
    Other(i32),
}

/// Host capability that checks device settings against a request.
pub trait SettingsChecker: Send + Sync {
    /// Check whether current settings can serve `request`.
    fn check(&self, request: &LocationRequest) -> BoxFuture<'static, SettingsStatus>;
}

/// Where the current start attempt is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StartPhase {
    /// No attempt in progress.
    #[default]
    Idle,
    /// Waiting for the settings checker.
    CheckingSettings,
    /// A resolvable error was published; waiting for the host to report how
    /// the user answered.
    AwaitingResolution,
    /// Waiting for the position source to confirm the stream.
    Starting,
    /// The position source is delivering updates.
    Streaming,
}
