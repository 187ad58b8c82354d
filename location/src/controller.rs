//! The subscription state machine.
//!
//! [`LiveLocation`] decides when the provider stream must run. It never
//! talks to collaborators itself: every call it wants made is queued as an
//! [`Effect`], and the owner feeds the answers back through the completion
//! methods. All state lives on the owner's task, so the type is neither
//! shared nor locked.

use std::collections::VecDeque;
use std::sync::Arc;

use liveloc_permission::{ActivityResult, PermissionResponse, REQUEST_CHECK_SETTINGS};
use log::{debug, error, info, warn};

use crate::{
    ActivationPolicy, ErrorType, LiveLocationConfig, LocationError, LocationRequest, ObserverId,
    Outcome, Position, ProviderError, SettingsStatus, StartPhase, StreamEpoch, StreamEvent,
    distribution::{Distribution, Transition},
    observer::Observer,
};

/// Identifies one settings check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CheckTicket(u64);

/// A collaborator call the controller wants made.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Fetch the last known position; answer with
    /// [`LiveLocation::last_known_fetched`].
    FetchLastKnown,
    /// Check settings; answer with [`LiveLocation::settings_checked`].
    CheckSettings {
        /// Ticket to hand back with the answer.
        ticket: CheckTicket,
        /// Request to check against.
        request: LocationRequest,
    },
    /// Start the provider stream; answer with
    /// [`LiveLocation::stream_started`] and route stream callbacks to
    /// [`LiveLocation::stream_event`].
    StartStream {
        /// Epoch the stream callbacks must carry.
        epoch: StreamEpoch,
        /// Request to stream for.
        request: LocationRequest,
    },
    /// Stop a stream whose start succeeded. Issued once per such stream;
    /// no answer expected.
    StopStream {
        /// Epoch of the stream being stopped.
        epoch: StreamEpoch,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum StreamState {
    Stopped,
    Starting {
        epoch: StreamEpoch,
        request: LocationRequest,
    },
    Running {
        epoch: StreamEpoch,
        request: LocationRequest,
    },
}

impl StreamState {
    const fn epoch(&self) -> Option<StreamEpoch> {
        match self {
            Self::Stopped => None,
            Self::Starting { epoch, .. } | Self::Running { epoch, .. } => Some(*epoch),
        }
    }

    const fn request(&self) -> Option<&LocationRequest> {
        match self {
            Self::Stopped => None,
            Self::Starting { request, .. } | Self::Running { request, .. } => Some(request),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingCheck {
    ticket: CheckTicket,
    // The request changed while the check was in flight.
    stale: bool,
}

/// Point-in-time view of the controller state.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Whether the caller wants updates.
    pub updates_requested: bool,
    /// Whether a recoverable error awaits host resolution.
    pub resolvable_error_dispatched: bool,
    /// Whether a settings check is in flight.
    pub settings_check_pending: bool,
    /// Number of attached observers.
    pub observer_count: usize,
    /// Whether the provider stream was started and not stopped.
    pub streaming: bool,
    /// Current start attempt phase.
    pub phase: StartPhase,
    /// The request updates are served for.
    pub active_request: Option<LocationRequest>,
}

/// Location subscription controller.
#[derive(Debug)]
pub struct LiveLocation {
    config: LiveLocationConfig,
    distribution: Distribution,
    active_request: Option<LocationRequest>,
    updates_requested: bool,
    resolvable_error_dispatched: bool,
    pending_check: Option<PendingCheck>,
    stream: StreamState,
    // Starts abandoned while in flight; stopped once they resolve.
    abandoned_starts: Vec<StreamEpoch>,
    next_ticket: u64,
    next_epoch: u64,
    effects: VecDeque<Effect>,
}

impl Default for LiveLocation {
    fn default() -> Self {
        Self::new(LiveLocationConfig::default())
    }
}

impl LiveLocation {
    /// Create an idle controller.
    #[must_use]
    pub fn new(config: LiveLocationConfig) -> Self {
        Self {
            config,
            distribution: Distribution::new(),
            active_request: None,
            updates_requested: false,
            resolvable_error_dispatched: false,
            pending_check: None,
            stream: StreamState::Stopped,
            abandoned_starts: Vec::new(),
            next_ticket: 1,
            next_epoch: 1,
            effects: VecDeque::new(),
        }
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &LiveLocationConfig {
        &self.config
    }

    /// Ask for updates served with `request`.
    ///
    /// If observers are attached, the settings check starts right away;
    /// otherwise it starts when the first observer attaches.
    pub fn request_updates(&mut self, request: LocationRequest) {
        self.active_request = Some(request);
        self.request_current_updates();
    }

    /// Ask for updates with the previous request, or the configured default
    /// if there never was one.
    pub fn request_default_updates(&mut self) {
        if self.active_request.is_none() {
            self.active_request = Some(self.config.default_request.clone());
        }
        self.request_current_updates();
    }

    fn request_current_updates(&mut self) {
        debug!("location updates requested");
        self.updates_requested = true;
        self.resolvable_error_dispatched = false;
        if let Some(pending) = &mut self.pending_check {
            pending.stale = true;
        }
        if !self.distribution.is_empty() {
            self.check_settings();
        }
    }

    /// Fetch the last known position once. The result is published like any
    /// stream update.
    pub fn get_last_location(&mut self) {
        self.effects.push_back(Effect::FetchLastKnown);
    }

    /// Stop the stream and withdraw the request for updates. Idempotent.
    pub fn stop_updates(&mut self) {
        if self.updates_requested {
            info!("location updates stopped");
        }
        self.updates_requested = false;
        self.stop_stream();
    }

    /// Attach an observer under a fresh id.
    pub fn subscribe(&mut self, observer: Arc<dyn Observer>) -> ObserverId {
        let id = ObserverId::next();
        self.attach(id, observer);
        id
    }

    /// Attach an observer under `id`. The latest outcome, if any, is
    /// replayed to it.
    pub fn attach(&mut self, id: ObserverId, observer: Arc<dyn Observer>) {
        if self.distribution.subscribe(id, observer) == Transition::Activated {
            self.on_active();
        }
    }

    /// Detach an observer.
    pub fn unsubscribe(&mut self, id: ObserverId) {
        if self.distribution.unsubscribe(id) == Transition::Deactivated {
            self.on_inactive();
        }
    }

    /// The host reports how the user answered a settings resolution.
    pub fn report_settings_resolution(&mut self, approved: bool) {
        if approved {
            debug!("location settings resolved");
            self.resolvable_error_dispatched = false;
            if self.updates_requested && !self.distribution.is_empty() {
                self.check_settings();
            }
        } else {
            self.publish_error(LocationError::new(ErrorType::SettingsChangeDenied));
        }
    }

    /// The host reports whether the location permission was granted.
    pub fn report_permission_result(&mut self, granted: bool) {
        if granted {
            debug!("location permission granted");
            self.resolvable_error_dispatched = false;
            if self.updates_requested {
                if !self.distribution.is_empty() {
                    self.check_settings();
                }
            } else {
                self.get_last_location();
            }
        } else {
            self.publish_error(LocationError::new(ErrorType::PermissionsDenied));
        }
    }

    /// Route a batched permission answer. Answers that say nothing about
    /// location are ignored.
    pub fn report_permission_response(&mut self, response: &PermissionResponse) {
        match response.location_grant() {
            Some(granted) => self.report_permission_result(granted),
            None => debug!(
                "permission response {} has no location entry",
                response.request_code()
            ),
        }
    }

    /// Route a dialog result. Only [`REQUEST_CHECK_SETTINGS`] is handled.
    pub fn report_activity_result(&mut self, request_code: i32, result: ActivityResult) {
        if request_code != REQUEST_CHECK_SETTINGS {
            return;
        }
        if let Some(approved) = result.decision() {
            self.report_settings_resolution(approved);
        }
    }

    /// Answer to [`Effect::FetchLastKnown`].
    pub fn last_known_fetched(&mut self, result: Result<Option<Position>, ProviderError>) {
        match result {
            Ok(Some(position)) => self.publish(Outcome::success(position)),
            Ok(None) => debug!("no last known location"),
            Err(ProviderError::PermissionDenied) => {
                if self.updates_requested {
                    debug!("last location needs permission; the update path reports it");
                } else {
                    self.publish_error(LocationError::new(ErrorType::PermissionsRequired));
                }
            }
            Err(err) => self.publish_provider_error(err),
        }
    }

    /// Answer to [`Effect::CheckSettings`].
    pub fn settings_checked(&mut self, ticket: CheckTicket, status: SettingsStatus) {
        let pending = match self.pending_check {
            Some(pending) if pending.ticket == ticket => pending,
            _ => {
                debug!("dropping result of superseded settings check");
                return;
            }
        };
        self.pending_check = None;

        if !self.updates_requested {
            debug!("updates withdrawn during settings check");
            return;
        }
        if pending.stale {
            if !self.distribution.is_empty() {
                self.check_settings();
            }
            return;
        }

        match status {
            SettingsStatus::Satisfied => {
                if self.distribution.is_empty() {
                    debug!("no observers left after settings check; not starting stream");
                } else {
                    self.start_stream();
                }
            }
            SettingsStatus::ResolutionRequired(resolution) => {
                self.publish_error(LocationError::settings_change_required(resolution));
            }
            SettingsStatus::Unavailable => {
                self.publish_error(LocationError::new(ErrorType::SettingsChangeUnavailable));
            }
            SettingsStatus::Other(code) => {
                warn!("ignoring unrecognized location settings status {code}");
            }
        }
    }

    /// Answer to [`Effect::StartStream`].
    pub fn stream_started(&mut self, epoch: StreamEpoch, result: Result<(), ProviderError>) {
        let request = match &self.stream {
            StreamState::Starting {
                epoch: current,
                request,
            } if *current == epoch => request.clone(),
            _ => {
                self.settle_abandoned_start(epoch, result.is_ok());
                return;
            }
        };

        match result {
            Ok(()) => {
                debug!("location stream {epoch:?} running");
                self.stream = StreamState::Running { epoch, request };
            }
            Err(ProviderError::PermissionDenied) => {
                self.stream = StreamState::Stopped;
                self.publish_error(LocationError::new(ErrorType::PermissionsRequired));
            }
            Err(err) => {
                self.stream = StreamState::Stopped;
                self.publish_provider_error(err);
            }
        }
    }

    /// A callback from the stream started by [`Effect::StartStream`].
    pub fn stream_event(&mut self, epoch: StreamEpoch, event: StreamEvent) {
        if self.stream.epoch() != Some(epoch) {
            debug!("dropping event from stopped stream {epoch:?}");
            return;
        }
        match event {
            StreamEvent::Position(position) => self.publish(Outcome::success(position)),
            StreamEvent::Unavailable => {
                debug!("location unavailable; re-checking settings");
                if self.updates_requested && !self.distribution.is_empty() {
                    self.check_settings();
                }
            }
        }
    }

    /// Take the next queued collaborator call.
    pub fn next_effect(&mut self) -> Option<Effect> {
        self.effects.pop_front()
    }

    /// Whether the caller wants updates.
    #[must_use]
    pub const fn updates_requested(&self) -> bool {
        self.updates_requested
    }

    /// Whether a recoverable error awaits host resolution.
    #[must_use]
    pub const fn resolvable_error_dispatched(&self) -> bool {
        self.resolvable_error_dispatched
    }

    /// Whether a settings check is in flight.
    #[must_use]
    pub const fn settings_check_pending(&self) -> bool {
        self.pending_check.is_some()
    }

    /// Whether a start abandoned while in flight has yet to resolve. Its
    /// stream is stopped once it does.
    #[must_use]
    pub fn has_abandoned_starts(&self) -> bool {
        !self.abandoned_starts.is_empty()
    }

    /// Number of attached observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.distribution.len()
    }

    /// Whether the provider stream was started and not stopped.
    #[must_use]
    pub const fn is_streaming(&self) -> bool {
        !matches!(self.stream, StreamState::Stopped)
    }

    /// The request updates are served for.
    #[must_use]
    pub const fn active_request(&self) -> Option<&LocationRequest> {
        self.active_request.as_ref()
    }

    /// The latest published outcome.
    #[must_use]
    pub const fn latest(&self) -> Option<&Arc<Outcome>> {
        self.distribution.latest()
    }

    /// Where the current start attempt is.
    #[must_use]
    pub const fn phase(&self) -> StartPhase {
        match self.stream {
            StreamState::Running { .. } => StartPhase::Streaming,
            StreamState::Starting { .. } => StartPhase::Starting,
            StreamState::Stopped if self.pending_check.is_some() => StartPhase::CheckingSettings,
            StreamState::Stopped if self.updates_requested && self.resolvable_error_dispatched => {
                StartPhase::AwaitingResolution
            }
            StreamState::Stopped => StartPhase::Idle,
        }
    }

    /// Capture the current state.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            updates_requested: self.updates_requested,
            resolvable_error_dispatched: self.resolvable_error_dispatched,
            settings_check_pending: self.settings_check_pending(),
            observer_count: self.observer_count(),
            streaming: self.is_streaming(),
            phase: self.phase(),
            active_request: self.active_request.clone(),
        }
    }

    fn on_active(&mut self) {
        debug!("first location observer attached");
        if !self.updates_requested {
            return;
        }
        if self.config.activation_policy == ActivationPolicy::DeferToPendingResolution
            && self.resolvable_error_dispatched
        {
            debug!("resolution pending; not re-checking settings");
            return;
        }
        self.check_settings();
    }

    fn on_inactive(&mut self) {
        debug!("last location observer detached");
        self.stop_stream();
    }

    fn current_request(&self) -> LocationRequest {
        self.active_request
            .clone()
            .unwrap_or_else(|| self.config.default_request.clone())
    }

    fn check_settings(&mut self) {
        if self.pending_check.is_some() {
            debug!("settings check already in flight");
            return;
        }
        let ticket = CheckTicket(self.next_ticket);
        self.next_ticket += 1;
        self.pending_check = Some(PendingCheck {
            ticket,
            stale: false,
        });
        debug!("checking location settings ({ticket:?})");
        self.effects.push_back(Effect::CheckSettings {
            ticket,
            request: self.current_request(),
        });
    }

    fn start_stream(&mut self) {
        let request = self.current_request();
        match self.stream.request() {
            None => {}
            Some(current) if *current == request => {
                debug!("location stream already serves this request");
                return;
            }
            Some(_) => {
                debug!("location request changed; restarting stream");
                self.stop_stream();
            }
        }
        let epoch = StreamEpoch(self.next_epoch);
        self.next_epoch += 1;
        debug!("starting location stream {epoch:?}");
        self.stream = StreamState::Starting {
            epoch,
            request: request.clone(),
        };
        self.effects
            .push_back(Effect::StartStream { epoch, request });
    }

    fn stop_stream(&mut self) {
        match std::mem::replace(&mut self.stream, StreamState::Stopped) {
            StreamState::Stopped => {}
            StreamState::Starting { epoch, .. } => {
                debug!("location stream {epoch:?} still starting; stopping it once it starts");
                self.abandoned_starts.push(epoch);
            }
            StreamState::Running { epoch, .. } => {
                debug!("stopping location stream {epoch:?}");
                self.effects.push_back(Effect::StopStream { epoch });
            }
        }
    }

    fn settle_abandoned_start(&mut self, epoch: StreamEpoch, started: bool) {
        let Some(index) = self.abandoned_starts.iter().position(|e| *e == epoch) else {
            debug!("dropping start result of unknown stream {epoch:?}");
            return;
        };
        self.abandoned_starts.swap_remove(index);
        if started {
            debug!("stopping abandoned location stream {epoch:?}");
            self.effects.push_back(Effect::StopStream { epoch });
        } else {
            debug!("abandoned location stream {epoch:?} failed to start");
        }
    }

    fn withdraw_updates(&mut self) {
        if self.updates_requested {
            info!("location updates withdrawn");
        }
        self.updates_requested = false;
        self.stop_stream();
    }

    fn publish_provider_error(&mut self, err: ProviderError) {
        let kind = match err {
            ProviderError::PermissionDenied => ErrorType::PermissionsRequired,
            ProviderError::Api { .. } => ErrorType::LocationApiError,
            ProviderError::Other(_) => ErrorType::Unknown,
        };
        error!("location provider failed: {err}");
        self.publish_error(LocationError::with_cause(kind, err));
    }

    fn publish_error(&mut self, error: LocationError) {
        self.publish(Outcome::failure(error));
    }

    fn publish(&mut self, outcome: Outcome) {
        let kind = outcome.peek_error_type();
        if let Some(kind) = kind {
            debug!("publishing location failure: {kind}");
            self.resolvable_error_dispatched = kind.is_resolvable();
        }
        self.distribution.publish(outcome);
        if kind.is_some_and(ErrorType::ends_subscription) {
            self.withdraw_updates();
        }
    }
}
