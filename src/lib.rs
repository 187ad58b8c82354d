//! # Liveloc
//!
//! Live location subscriptions that sort out permissions and device settings
//! before any position is delivered.
//!
//! ## Features
//!
//! - `permission`: Permission prompts and routing of host permission results.
//! - `location`: The subscription controller and its async driver. Enables
//!   `permission`.
//!
//! Use the `full` feature to enable everything.
//!
//! ## Example
//!
//! ```toml
//! [dependencies]
//! liveloc = { version = "0.1", features = ["location"] }
//! ```
//!
//! ```rust
//! # #[cfg(feature = "location")]
//! # {
//! use liveloc::location::{LiveLocation, LiveLocationConfig, LocationRequest};
//!
//! let mut live = LiveLocation::new(LiveLocationConfig::default());
//! live.request_updates(LocationRequest::default());
//! assert!(live.updates_requested());
//! # }
//! ```

#[cfg(feature = "location")]
pub use liveloc_location as location;

#[cfg(feature = "permission")]
pub use liveloc_permission as permission;
