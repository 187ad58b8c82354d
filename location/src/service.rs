//! Async driver that owns a [`LiveLocation`] and runs its effects.
//!
//! The controller lives on a single task. Handles, collaborator futures and
//! stream callbacks all reach it through queues, so state is only ever
//! mutated in one place and callbacks are applied in arrival order.

use std::fmt;
use std::sync::Arc;

use async_channel::{Receiver, Sender, unbounded};
use futures::channel::oneshot;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt, select_biased};
use liveloc_permission::{ActivityResult, PermissionError, PermissionPrompt, PermissionResponse};
use log::debug;

use crate::{
    Effect, LiveLocation, LiveLocationConfig, LocationRequest, ObserverId, Position,
    PositionSource, ProviderError, SettingsChecker, SettingsStatus, Snapshot, StreamEpoch,
    StreamMessage, StreamSink,
    controller::CheckTicket,
    observer::Observer,
};

/// Errors returned by [`LiveLocationHandle`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    /// The driver task is no longer running.
    #[error("location service is not running")]
    Closed,
    /// Asking for the permission failed.
    #[error("permission request failed: {0}")]
    Permission(#[from] PermissionError),
}

enum Command {
    RequestUpdates(Option<LocationRequest>),
    GetLastLocation,
    StopUpdates,
    Subscribe(ObserverId, Arc<dyn Observer>),
    Unsubscribe(ObserverId),
    SettingsResolution(bool),
    PermissionResult(bool),
    PermissionResponse(PermissionResponse),
    ActivityResult(i32, ActivityResult),
    Snapshot(oneshot::Sender<Snapshot>),
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestUpdates(request) => f.debug_tuple("RequestUpdates").field(request).finish(),
            Self::GetLastLocation => f.write_str("GetLastLocation"),
            Self::StopUpdates => f.write_str("StopUpdates"),
            Self::Subscribe(id, _) => f.debug_tuple("Subscribe").field(id).finish(),
            Self::Unsubscribe(id) => f.debug_tuple("Unsubscribe").field(id).finish(),
            Self::SettingsResolution(approved) => {
                f.debug_tuple("SettingsResolution").field(approved).finish()
            }
            Self::PermissionResult(granted) => {
                f.debug_tuple("PermissionResult").field(granted).finish()
            }
            Self::PermissionResponse(response) => {
                f.debug_tuple("PermissionResponse").field(response).finish()
            }
            Self::ActivityResult(code, result) => f
                .debug_tuple("ActivityResult")
                .field(code)
                .field(result)
                .finish(),
            Self::Snapshot(_) => f.write_str("Snapshot"),
        }
    }
}

enum Completion {
    LastKnown(Result<Option<Position>, ProviderError>),
    Settings(CheckTicket, SettingsStatus),
    Started(StreamEpoch, Result<(), ProviderError>),
}

/// Cloneable handle to a running [`LiveLocationService`].
///
/// Every call is queued to the driver and applied in order.
#[derive(Debug, Clone)]
pub struct LiveLocationHandle {
    commands: Sender<Command>,
}

impl LiveLocationHandle {
    fn send(&self, command: Command) -> Result<&Self, ServiceError> {
        self.commands
            .try_send(command)
            .map_err(|_| ServiceError::Closed)?;
        Ok(self)
    }

    /// Ask for updates served with `request`.
    ///
    /// # Errors
    /// Returns [`ServiceError::Closed`] if the driver is gone.
    pub fn request_updates(&self, request: LocationRequest) -> Result<&Self, ServiceError> {
        self.send(Command::RequestUpdates(Some(request)))
    }

    /// Ask for updates with the previous or default request.
    ///
    /// # Errors
    /// Returns [`ServiceError::Closed`] if the driver is gone.
    pub fn request_default_updates(&self) -> Result<&Self, ServiceError> {
        self.send(Command::RequestUpdates(None))
    }

    /// Fetch the last known position once.
    ///
    /// # Errors
    /// Returns [`ServiceError::Closed`] if the driver is gone.
    pub fn get_last_location(&self) -> Result<&Self, ServiceError> {
        self.send(Command::GetLastLocation)
    }

    /// Stop updates and withdraw the request.
    ///
    /// # Errors
    /// Returns [`ServiceError::Closed`] if the driver is gone.
    pub fn stop_updates(&self) -> Result<(), ServiceError> {
        self.send(Command::StopUpdates).map(|_| ())
    }

    /// Attach an observer.
    ///
    /// # Errors
    /// Returns [`ServiceError::Closed`] if the driver is gone.
    pub fn subscribe(&self, observer: Arc<dyn Observer>) -> Result<ObserverId, ServiceError> {
        let id = ObserverId::next();
        self.send(Command::Subscribe(id, observer))?;
        Ok(id)
    }

    /// Detach an observer.
    ///
    /// # Errors
    /// Returns [`ServiceError::Closed`] if the driver is gone.
    pub fn unsubscribe(&self, id: ObserverId) -> Result<(), ServiceError> {
        self.send(Command::Unsubscribe(id)).map(|_| ())
    }

    /// Report how the user answered a settings resolution.
    ///
    /// # Errors
    /// Returns [`ServiceError::Closed`] if the driver is gone.
    pub fn report_settings_resolution(&self, approved: bool) -> Result<(), ServiceError> {
        self.send(Command::SettingsResolution(approved)).map(|_| ())
    }

    /// Report whether the location permission was granted.
    ///
    /// # Errors
    /// Returns [`ServiceError::Closed`] if the driver is gone.
    pub fn report_permission_result(&self, granted: bool) -> Result<(), ServiceError> {
        self.send(Command::PermissionResult(granted)).map(|_| ())
    }

    /// Report a batched permission answer.
    ///
    /// # Errors
    /// Returns [`ServiceError::Closed`] if the driver is gone.
    pub fn report_permissions_result(
        &self,
        response: PermissionResponse,
    ) -> Result<(), ServiceError> {
        self.send(Command::PermissionResponse(response)).map(|_| ())
    }

    /// Report how a host dialog closed.
    ///
    /// # Errors
    /// Returns [`ServiceError::Closed`] if the driver is gone.
    pub fn report_activity_result(
        &self,
        request_code: i32,
        result: ActivityResult,
    ) -> Result<(), ServiceError> {
        self.send(Command::ActivityResult(request_code, result))
            .map(|_| ())
    }

    /// Ask the user for the location permission through `prompt` and report
    /// the answer.
    ///
    /// # Errors
    /// Returns [`ServiceError::Permission`] if the prompt fails, or
    /// [`ServiceError::Closed`] if the driver is gone.
    pub async fn request_permissions(
        &self,
        prompt: &dyn PermissionPrompt,
    ) -> Result<(), ServiceError> {
        let response = liveloc_permission::request_location(prompt).await?;
        self.report_permissions_result(response)
    }

    /// Capture the controller state once every earlier call was applied.
    ///
    /// # Errors
    /// Returns [`ServiceError::Closed`] if the driver is gone.
    pub async fn snapshot(&self) -> Result<Snapshot, ServiceError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot(tx))?;
        rx.await.map_err(|_| ServiceError::Closed)
    }
}

/// Owns a [`LiveLocation`] and its collaborators.
///
/// Spawn [`LiveLocationService::run`] on any executor. It returns once every
/// [`LiveLocationHandle`] is dropped.
pub struct LiveLocationService {
    controller: LiveLocation,
    source: Arc<dyn PositionSource>,
    checker: Arc<dyn SettingsChecker>,
    commands: Receiver<Command>,
    stream_tx: Sender<StreamMessage>,
    stream_rx: Receiver<StreamMessage>,
    pending: FuturesUnordered<BoxFuture<'static, Completion>>,
}

impl fmt::Debug for LiveLocationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveLocationService")
            .field("controller", &self.controller)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl LiveLocationService {
    /// Create a driver and the handle that talks to it.
    pub fn new(
        source: Arc<dyn PositionSource>,
        checker: Arc<dyn SettingsChecker>,
        config: LiveLocationConfig,
    ) -> (Self, LiveLocationHandle) {
        let (command_tx, commands) = unbounded();
        let (stream_tx, stream_rx) = unbounded();
        let service = Self {
            controller: LiveLocation::new(config),
            source,
            checker,
            commands,
            stream_tx,
            stream_rx,
            pending: FuturesUnordered::new(),
        };
        (
            service,
            LiveLocationHandle {
                commands: command_tx,
            },
        )
    }

    /// Drive the controller until every handle is dropped.
    ///
    /// On shutdown updates are stopped, and starts still in flight are
    /// awaited so their streams can be stopped too.
    ///
    /// Collaborator answers are applied before stream callbacks, and stream
    /// callbacks before handle commands.
    #[allow(clippy::mut_mut)] // triggered by `select!` internals
    pub async fn run(mut self) {
        loop {
            select_biased! {
                completion = self.pending.select_next_some() => self.complete(completion),
                message = self.stream_rx.recv().fuse() => {
                    if let Ok(message) = message {
                        self.controller.stream_event(message.epoch, message.event);
                    }
                }
                command = self.commands.recv().fuse() => match command {
                    Ok(command) => self.apply(command),
                    Err(_) => break,
                },
            }
            self.dispatch_effects();
        }

        debug!("location service shutting down");
        self.controller.stop_updates();
        self.dispatch_effects();
        while self.controller.has_abandoned_starts() {
            let Some(completion) = self.pending.next().await else {
                break;
            };
            self.complete(completion);
            self.dispatch_effects();
        }
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::RequestUpdates(Some(request)) => self.controller.request_updates(request),
            Command::RequestUpdates(None) => self.controller.request_default_updates(),
            Command::GetLastLocation => self.controller.get_last_location(),
            Command::StopUpdates => self.controller.stop_updates(),
            Command::Subscribe(id, observer) => self.controller.attach(id, observer),
            Command::Unsubscribe(id) => self.controller.unsubscribe(id),
            Command::SettingsResolution(approved) => {
                self.controller.report_settings_resolution(approved);
            }
            Command::PermissionResult(granted) => {
                self.controller.report_permission_result(granted);
            }
            Command::PermissionResponse(response) => {
                self.controller.report_permission_response(&response);
            }
            Command::ActivityResult(code, result) => {
                self.controller.report_activity_result(code, result);
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.controller.snapshot());
            }
        }
    }

    fn complete(&mut self, completion: Completion) {
        match completion {
            Completion::LastKnown(result) => self.controller.last_known_fetched(result),
            Completion::Settings(ticket, status) => {
                self.controller.settings_checked(ticket, status);
            }
            Completion::Started(epoch, result) => self.controller.stream_started(epoch, result),
        }
    }

    fn dispatch_effects(&mut self) {
        while let Some(effect) = self.controller.next_effect() {
            match effect {
                Effect::FetchLastKnown => {
                    self.pending
                        .push(self.source.fetch_last_known().map(Completion::LastKnown).boxed());
                }
                Effect::CheckSettings { ticket, request } => {
                    self.pending.push(
                        self.checker
                            .check(&request)
                            .map(move |status| Completion::Settings(ticket, status))
                            .boxed(),
                    );
                }
                Effect::StartStream { epoch, request } => {
                    let sink = StreamSink::new(epoch, self.stream_tx.clone());
                    self.pending.push(
                        self.source
                            .start_stream(request, sink)
                            .map(move |result| Completion::Started(epoch, result))
                            .boxed(),
                    );
                }
                Effect::StopStream { epoch } => self.source.stop_stream(epoch),
            }
        }
    }
}
