use crate::{Permission, PermissionStatus};

/// Request code the host uses when presenting a settings resolution dialog.
pub const REQUEST_CHECK_SETTINGS: i32 = 9000;

/// Request code the host uses when asking for the location permission.
pub const REQUEST_LOCATION_PERMISSIONS: i32 = 9001;

/// How a host-presented dialog was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityResult {
    /// The user accepted.
    Ok,
    /// The user dismissed or declined.
    Canceled,
    /// Any other platform result code.
    Other(i32),
}

impl ActivityResult {
    /// Map the user's decision to approved/denied. `Other` codes carry no
    /// decision.
    #[must_use]
    pub const fn decision(self) -> Option<bool> {
        match self {
            Self::Ok => Some(true),
            Self::Canceled => Some(false),
            Self::Other(_) => None,
        }
    }
}

/// The answer to a (possibly batched) permission request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionResponse {
    request_code: i32,
    entries: Vec<(Permission, PermissionStatus)>,
}

impl PermissionResponse {
    /// Pair every requested permission with its status.
    #[must_use]
    pub fn new(request_code: i32, entries: Vec<(Permission, PermissionStatus)>) -> Self {
        Self {
            request_code,
            entries,
        }
    }

    /// The request code the host used.
    #[must_use]
    pub const fn request_code(&self) -> i32 {
        self.request_code
    }

    /// All answered permissions.
    #[must_use]
    pub fn entries(&self) -> &[(Permission, PermissionStatus)] {
        &self.entries
    }

    /// Reduce the batch to the location grant.
    ///
    /// A request issued under [`REQUEST_LOCATION_PERMISSIONS`] only ever asks
    /// for location, so its first entry decides. Any other batch is scanned
    /// for the first location permission; the rest are ignored. `None` means
    /// the response says nothing about location.
    #[must_use]
    pub fn location_grant(&self) -> Option<bool> {
        let entry = if self.request_code == REQUEST_LOCATION_PERMISSIONS {
            self.entries.first()
        } else {
            self.entries
                .iter()
                .find(|(permission, _)| permission.is_location())
        };
        entry.map(|(_, status)| status.is_granted())
    }
}
