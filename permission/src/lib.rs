//! Permission vocabulary shared by the liveloc crates.
//!
//! The host application owns the actual permission dialogs. This crate only
//! describes what can be asked for, how the answer looks, and how a batched
//! answer is reconciled down to the single location grant the subscription
//! controller cares about.

#![warn(missing_docs)]

mod response;

use futures::future::BoxFuture;

pub use response::{
    ActivityResult, PermissionResponse, REQUEST_CHECK_SETTINGS, REQUEST_LOCATION_PERMISSIONS,
};

/// Types of permissions that can be requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Permission {
    /// Precise device location.
    FineLocation,
    /// Approximate device location.
    CoarseLocation,
    /// Access to device camera.
    Camera,
    /// Access to device microphone.
    Microphone,
    /// Access to contacts.
    Contacts,
    /// Access to calendar.
    Calendar,
}

impl Permission {
    /// Whether this permission gates location access.
    #[must_use]
    pub const fn is_location(self) -> bool {
        matches!(self, Self::FineLocation | Self::CoarseLocation)
    }
}

/// The current status of a permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionStatus {
    /// Permission has been granted by the user.
    Granted,
    /// Permission has been denied by the user.
    Denied,
    /// Permission is restricted (e.g., parental controls).
    Restricted,
    /// Permission has not been requested yet.
    NotDetermined,
}

impl PermissionStatus {
    /// Only [`PermissionStatus::Granted`] counts as a grant.
    #[must_use]
    pub const fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// Errors that can occur when requesting permissions.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PermissionError {
    /// The permission type is not supported on this platform.
    #[error("permission not supported on this platform")]
    NotSupported,
    /// An unknown error occurred.
    #[error("unknown error: {0}")]
    Unknown(String),
}

/// Host capability that shows the platform permission dialog.
///
/// Implementations answer with one status per requested permission, in the
/// order they were asked for.
pub trait PermissionPrompt: Send + Sync {
    /// Ask the user for `permissions`.
    ///
    /// # Errors
    /// Returns a [`PermissionError`] if the dialog could not be shown.
    fn request(
        &self,
        permissions: &[Permission],
    ) -> BoxFuture<'static, Result<Vec<PermissionStatus>, PermissionError>>;
}

/// Ask `prompt` for the location permission and pair the answer with the
/// permissions it belongs to.
///
/// # Errors
/// Propagates the prompt's [`PermissionError`].
pub async fn request_location(
    prompt: &dyn PermissionPrompt,
) -> Result<PermissionResponse, PermissionError> {
    let permissions = [Permission::FineLocation];
    let statuses = prompt.request(&permissions).await?;
    Ok(PermissionResponse::new(
        REQUEST_LOCATION_PERMISSIONS,
        permissions.into_iter().zip(statuses).collect(),
    ))
}
