//! Location subscriptions gated by permissions and device settings.
//!
//! This crate sequences everything that has to happen before location
//! updates can flow: the location permission, a device settings check, and
//! starting or stopping the provider stream as observers come and go. It
//! does not compute positions; a [`PositionSource`] does that, and a
//! [`SettingsChecker`] tells whether device settings can serve a request.
//!
//! Every outcome, success or failure, reaches observers as an [`Outcome`]
//! through the same channel. Recoverable failures wait for the host to
//! report how the user resolved them; nothing is retried automatically.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use liveloc_location::{Handled, LiveLocationConfig, LiveLocationService, LocationRequest};
//!
//! let (service, handle) = LiveLocationService::new(source, checker, LiveLocationConfig::default());
//! tokio::spawn(service.run());
//!
//! handle.request_updates(LocationRequest::default())?;
//! let id = handle.subscribe(Arc::new(Handled(my_observer)))?;
//!
//! // After the settings dialog closes:
//! handle.report_settings_resolution(true)?;
//! ```

#![warn(missing_docs)]

mod config;
mod controller;
mod distribution;
mod error;
mod observer;
mod outcome;
mod position;
mod request;
mod service;
mod settings;
mod source;

pub use config::{ActivationPolicy, ConfigError, LiveLocationConfig};
pub use controller::{CheckTicket, Effect, LiveLocation, Snapshot};
pub use distribution::{Distribution, Transition};
pub use error::{ErrorType, LocationError, ProviderError};
pub use liveloc_permission::{
    ActivityResult, Permission, PermissionResponse, PermissionStatus, REQUEST_CHECK_SETTINGS,
    REQUEST_LOCATION_PERMISSIONS,
};
pub use observer::{Handled, LocationObserver, Observer, ObserverId};
pub use outcome::{Outcome, Payload};
pub use position::Position;
pub use request::{LocationRequest, Priority};
pub use service::{LiveLocationHandle, LiveLocationService, ServiceError};
pub use settings::{ResolutionHandle, SettingsChecker, SettingsStatus, StartPhase};
pub use source::{PositionSource, StreamEpoch, StreamEvent, StreamMessage, StreamSink};
