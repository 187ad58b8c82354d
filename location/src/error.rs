use std::fmt;

use crate::settings::ResolutionHandle;

/// Classification of a failed location attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// The location permission is missing. Recoverable by asking for it.
    PermissionsRequired,
    /// The user refused the location permission. Ends the subscription.
    PermissionsDenied,
    /// Device settings do not satisfy the request, but a system dialog can
    /// fix them. Recoverable.
    SettingsChangeRequired,
    /// Device settings do not satisfy the request and cannot be fixed.
    /// Ends the current attempt only.
    SettingsChangeUnavailable,
    /// The user refused to change settings. Ends the subscription.
    SettingsChangeDenied,
    /// The location API reported an error.
    LocationApiError,
    /// Anything else.
    Unknown,
}

impl ErrorType {
    /// Whether a host-mediated action can resolve this error and resume the
    /// in-flight operation.
    #[must_use]
    pub const fn is_resolvable(self) -> bool {
        matches!(self, Self::PermissionsRequired | Self::SettingsChangeRequired)
    }

    /// Whether this error withdraws the request for updates.
    #[must_use]
    pub const fn ends_subscription(self) -> bool {
        matches!(self, Self::PermissionsDenied | Self::SettingsChangeDenied)
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PermissionsRequired => write!(f, "location permission required"),
            Self::PermissionsDenied => write!(f, "location permission denied"),
            Self::SettingsChangeRequired => write!(f, "location settings change required"),
            Self::SettingsChangeUnavailable => write!(f, "location settings change unavailable"),
            Self::SettingsChangeDenied => write!(f, "location settings change denied"),
            Self::LocationApiError => write!(f, "location api error"),
            Self::Unknown => write!(f, "unknown location error"),
        }
    }
}

/// Failure kinds reported by a [`PositionSource`](crate::PositionSource).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The platform rejected the call for lack of permission.
    #[error("permission denied by platform")]
    PermissionDenied,
    /// The location API returned a status code.
    #[error("location api error {code}: {message}")]
    Api {
        /// Platform status code.
        code: i32,
        /// Human readable detail.
        message: String,
    },
    /// Any other failure.
    #[error("{0}")]
    Other(String),
}

/// An immutable description of why a location attempt failed.
#[derive(Debug, Clone)]
pub struct LocationError {
    kind: ErrorType,
    cause: Option<ProviderError>,
    resolution: Option<ResolutionHandle>,
}

impl LocationError {
    /// An error with no further detail.
    #[must_use]
    pub const fn new(kind: ErrorType) -> Self {
        Self {
            kind,
            cause: None,
            resolution: None,
        }
    }

    /// An error caused by a provider failure.
    #[must_use]
    pub const fn with_cause(kind: ErrorType, cause: ProviderError) -> Self {
        Self {
            kind,
            cause: Some(cause),
            resolution: None,
        }
    }

    /// A [`ErrorType::SettingsChangeRequired`] error carrying the handle the
    /// host presents to the user.
    #[must_use]
    pub const fn settings_change_required(resolution: ResolutionHandle) -> Self {
        Self {
            kind: ErrorType::SettingsChangeRequired,
            cause: None,
            resolution: Some(resolution),
        }
    }

    /// The classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorType {
        self.kind
    }

    /// The underlying provider failure, if any.
    #[must_use]
    pub const fn cause(&self) -> Option<&ProviderError> {
        self.cause.as_ref()
    }

    /// The resolution handle of a settings change request.
    #[must_use]
    pub const fn resolution(&self) -> Option<&ResolutionHandle> {
        self.resolution.as_ref()
    }
}

impl fmt::Display for LocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}: {cause}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for LocationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}
