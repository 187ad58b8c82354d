use serde::{Deserialize, Serialize};

use crate::LocationRequest;

/// What happens to settings checks when an observer attaches again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationPolicy {
    /// Re-check settings on attach, unless a recoverable error is still
    /// waiting for the host to report its resolution.
    #[default]
    DeferToPendingResolution,
    /// Re-check settings on every attach.
    AlwaysRecheck,
}

/// Controller configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LiveLocationConfig {
    /// Re-attach behavior.
    #[serde(default)]
    pub activation_policy: ActivationPolicy,
    /// Request used when updates are requested without one.
    #[serde(default)]
    pub default_request: LocationRequest,
}

/// Errors that can occur when loading a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The document is not valid configuration JSON.
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl LiveLocationConfig {
    /// Parse a JSON configuration. Missing fields take their defaults.
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] if the document is malformed.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the activation policy.
    #[must_use]
    pub const fn with_activation_policy(mut self, policy: ActivationPolicy) -> Self {
        self.activation_policy = policy;
        self
    }

    /// Set the default request.
    #[must_use]
    pub fn with_default_request(mut self, request: LocationRequest) -> Self {
        self.default_request = request;
        self
    }
}
