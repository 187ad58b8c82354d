//! End-to-end tests of the location service driver with scripted
//! collaborators.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::BoxFuture;
use liveloc_location::{
    ErrorType, LiveLocationConfig, LiveLocationHandle, LiveLocationService, LocationRequest,
    Observer, Outcome, Permission, PermissionStatus, Position, PositionSource, Priority,
    ProviderError, ResolutionHandle, ServiceError, SettingsChecker, SettingsStatus, StartPhase,
    StreamEpoch, StreamSink,
};
use liveloc_permission::{PermissionError, PermissionPrompt};

#[derive(Default)]
struct MockSource {
    fetches: AtomicUsize,
    starts: AtomicUsize,
    stops: AtomicUsize,
    last_known: Mutex<Option<Result<Option<Position>, ProviderError>>>,
    start_results: Mutex<VecDeque<Result<(), ProviderError>>>,
    sink: Mutex<Option<StreamSink>>,
    hold_starts: AtomicBool,
    held_starts: Mutex<Vec<oneshot::Sender<Result<(), ProviderError>>>>,
    live: Arc<Mutex<Vec<StreamEpoch>>>,
}

impl MockSource {
    fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    fn sink(&self) -> StreamSink {
        self.sink.lock().unwrap().clone().expect("stream was started")
    }

    fn live(&self) -> Vec<StreamEpoch> {
        self.live.lock().unwrap().clone()
    }

    fn release_start(&self, result: Result<(), ProviderError>) {
        let sender = self.held_starts.lock().unwrap().remove(0);
        let _ = sender.send(result);
    }
}

impl PositionSource for MockSource {
    fn fetch_last_known(&self) -> BoxFuture<'static, Result<Option<Position>, ProviderError>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let result = self.last_known.lock().unwrap().clone().unwrap_or(Ok(None));
        futures::future::ready(result).boxed()
    }

    fn start_stream(
        &self,
        _request: LocationRequest,
        sink: StreamSink,
    ) -> BoxFuture<'static, Result<(), ProviderError>> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let epoch = sink.epoch();
        *self.sink.lock().unwrap() = Some(sink);
        let live = self.live.clone();
        let track = move |result: Result<(), ProviderError>| {
            if result.is_ok() {
                live.lock().unwrap().push(epoch);
            }
            result
        };
        if self.hold_starts.load(Ordering::SeqCst) {
            let (tx, rx) = oneshot::channel();
            self.held_starts.lock().unwrap().push(tx);
            return rx
                .map(move |result| {
                    track(result.unwrap_or_else(|_| Err(ProviderError::Other("dropped".into()))))
                })
                .boxed();
        }
        let result = self.start_results.lock().unwrap().pop_front().unwrap_or(Ok(()));
        futures::future::ready(track(result)).boxed()
    }

    fn stop_stream(&self, epoch: StreamEpoch) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.live.lock().unwrap().retain(|live| *live != epoch);
    }
}

/// Answers checks from a script; once the script runs dry, checks stay in
/// flight until the test releases them.
#[derive(Default)]
struct MockChecker {
    checks: AtomicUsize,
    script: Mutex<VecDeque<SettingsStatus>>,
    held: Mutex<Vec<oneshot::Sender<SettingsStatus>>>,
}

impl MockChecker {
    fn scripted(statuses: impl IntoIterator<Item = SettingsStatus>) -> Self {
        Self {
            script: Mutex::new(statuses.into_iter().collect()),
            ..Self::default()
        }
    }

    fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }

    fn release(&self, status: SettingsStatus) {
        let sender = self.held.lock().unwrap().remove(0);
        let _ = sender.send(status);
    }
}

impl SettingsChecker for MockChecker {
    fn check(&self, _request: &LocationRequest) -> BoxFuture<'static, SettingsStatus> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.script.lock().unwrap().pop_front() {
            return futures::future::ready(status).boxed();
        }
        let (tx, rx) = oneshot::channel();
        self.held.lock().unwrap().push(tx);
        rx.map(|status| status.unwrap_or(SettingsStatus::Other(-1)))
            .boxed()
    }
}

type Seen = Arc<Mutex<Vec<Arc<Outcome>>>>;

fn recorder() -> (Arc<dyn Observer>, Seen) {
    let seen: Seen = Arc::default();
    let sink = seen.clone();
    let observer: Arc<dyn Observer> =
        Arc::new(move |outcome: &Arc<Outcome>| sink.lock().unwrap().push(outcome.clone()));
    (observer, seen)
}

fn kinds(seen: &Seen) -> Vec<Option<ErrorType>> {
    seen.lock()
        .unwrap()
        .iter()
        .map(|outcome| outcome.peek_error_type())
        .collect()
}

fn spawn(
    source: &Arc<MockSource>,
    checker: &Arc<MockChecker>,
) -> (LiveLocationHandle, tokio::task::JoinHandle<()>) {
    let (service, handle) = LiveLocationService::new(
        source.clone(),
        checker.clone(),
        LiveLocationConfig::default(),
    );
    (handle, tokio::spawn(service.run()))
}

fn fix(timestamp: u64) -> Position {
    Position::new(59.33, 18.07, timestamp).with_accuracy(5.0)
}

#[tokio::test]
async fn streams_positions_and_rechecks_when_unavailable() {
    let source = Arc::new(MockSource::default());
    let checker = Arc::new(MockChecker::scripted([
        SettingsStatus::Satisfied,
        SettingsStatus::Satisfied,
    ]));
    let (handle, _driver) = spawn(&source, &checker);

    let (observer, seen) = recorder();
    handle.request_updates(LocationRequest::default()).unwrap();
    handle.subscribe(observer).unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.phase, StartPhase::Streaming);
    assert_eq!(source.starts(), 1);

    source.sink().position(fix(1));
    handle.snapshot().await.unwrap();
    {
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].position(), Some(&fix(1)));
    }

    source.sink().unavailable();
    handle.snapshot().await.unwrap();
    assert_eq!(checker.checks(), 2);
    assert_eq!(source.starts(), 1);
}

#[tokio::test]
async fn provider_stream_follows_observer_presence() {
    let source = Arc::new(MockSource::default());
    let checker = Arc::new(MockChecker::scripted(
        std::iter::repeat_n(SettingsStatus::Satisfied, 8),
    ));
    let (handle, _driver) = spawn(&source, &checker);

    handle.request_updates(LocationRequest::default()).unwrap();
    for round in 1..=3 {
        let (first, _) = recorder();
        let (second, _) = recorder();
        let a = handle.subscribe(first).unwrap();
        let b = handle.subscribe(second).unwrap();
        assert!(handle.snapshot().await.unwrap().streaming);
        assert_eq!(source.starts(), round);

        handle.unsubscribe(a).unwrap();
        assert!(handle.snapshot().await.unwrap().streaming);
        handle.unsubscribe(b).unwrap();
        let snapshot = handle.snapshot().await.unwrap();
        assert!(!snapshot.streaming);
        assert!(snapshot.updates_requested);
        assert_eq!(source.stops(), round);
    }
}

#[tokio::test]
async fn resolution_required_waits_for_host() {
    let source = Arc::new(MockSource::default());
    let checker = Arc::new(MockChecker::scripted([
        SettingsStatus::ResolutionRequired(ResolutionHandle::new(9000_i32)),
        SettingsStatus::Satisfied,
    ]));
    let (handle, _driver) = spawn(&source, &checker);

    let (observer, seen) = recorder();
    handle.subscribe(observer).unwrap();
    handle.request_updates(LocationRequest::default()).unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.phase, StartPhase::AwaitingResolution);
    assert_eq!(kinds(&seen), vec![Some(ErrorType::SettingsChangeRequired)]);
    assert_eq!(source.starts(), 0);
    assert_eq!(checker.checks(), 1);

    handle.report_settings_resolution(true).unwrap();
    handle.snapshot().await.unwrap();
    assert_eq!(checker.checks(), 2);
    assert_eq!(source.starts(), 1);
    assert_eq!(kinds(&seen).len(), 1);
}

#[tokio::test]
async fn permission_denial_blocks_next_subscribe() {
    let source = Arc::new(MockSource::default());
    source
        .start_results
        .lock()
        .unwrap()
        .push_back(Err(ProviderError::PermissionDenied));
    let checker = Arc::new(MockChecker::scripted([SettingsStatus::Satisfied]));
    let (handle, _driver) = spawn(&source, &checker);

    let (observer, seen) = recorder();
    let id = handle.subscribe(observer.clone()).unwrap();
    handle.request_updates(LocationRequest::default()).unwrap();
    handle.snapshot().await.unwrap();
    assert_eq!(kinds(&seen), vec![Some(ErrorType::PermissionsRequired)]);

    handle.report_permission_result(false).unwrap();
    handle.unsubscribe(id).unwrap();
    handle.subscribe(observer).unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert!(!snapshot.updates_requested);
    assert!(!snapshot.streaming);
    assert_eq!(source.starts(), 1);
    assert_eq!(checker.checks(), 1);
    assert_eq!(
        kinds(&seen).last().copied().flatten(),
        Some(ErrorType::PermissionsDenied)
    );
}

#[tokio::test]
async fn detach_during_settings_check_never_starts_stream() {
    let source = Arc::new(MockSource::default());
    let checker = Arc::new(MockChecker::default());
    let (handle, _driver) = spawn(&source, &checker);

    let (observer, _) = recorder();
    let id = handle.subscribe(observer).unwrap();
    handle.request_updates(LocationRequest::default()).unwrap();
    assert!(handle.snapshot().await.unwrap().settings_check_pending);

    handle.unsubscribe(id).unwrap();
    handle.snapshot().await.unwrap();
    checker.release(SettingsStatus::Satisfied);
    let snapshot = handle.snapshot().await.unwrap();
    assert!(!snapshot.settings_check_pending);
    assert!(!snapshot.streaming);
    assert_eq!(source.starts(), 0);
}

#[tokio::test]
async fn last_location_shares_the_outcome_channel() {
    let source = Arc::new(MockSource::default());
    *source.last_known.lock().unwrap() = Some(Ok(Some(fix(42))));
    let checker = Arc::new(MockChecker::default());
    let (handle, _driver) = spawn(&source, &checker);

    let (observer, seen) = recorder();
    handle.subscribe(observer).unwrap();
    handle.get_last_location().unwrap();
    handle.snapshot().await.unwrap();
    assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    assert!(seen.lock().unwrap()[0].is_success());

    *source.last_known.lock().unwrap() = Some(Err(ProviderError::PermissionDenied));
    handle.get_last_location().unwrap();
    handle.snapshot().await.unwrap();
    assert_eq!(
        kinds(&seen),
        vec![None, Some(ErrorType::PermissionsRequired)]
    );
}

#[tokio::test]
async fn prompt_answer_is_routed_into_the_gate() {
    struct Grant;

    impl PermissionPrompt for Grant {
        fn request(
            &self,
            permissions: &[Permission],
        ) -> BoxFuture<'static, Result<Vec<PermissionStatus>, PermissionError>> {
            assert_eq!(permissions, [Permission::FineLocation]);
            futures::future::ready(Ok(vec![PermissionStatus::Granted])).boxed()
        }
    }

    let source = Arc::new(MockSource::default());
    *source.last_known.lock().unwrap() = Some(Err(ProviderError::PermissionDenied));
    let checker = Arc::new(MockChecker::default());
    let (handle, _driver) = spawn(&source, &checker);

    handle.get_last_location().unwrap();
    assert!(handle.snapshot().await.unwrap().resolvable_error_dispatched);

    *source.last_known.lock().unwrap() = Some(Ok(Some(fix(7))));
    handle.request_permissions(&Grant).await.unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert!(!snapshot.resolvable_error_dispatched);
    assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn dropping_every_handle_stops_stream_and_driver() {
    let source = Arc::new(MockSource::default());
    let checker = Arc::new(MockChecker::scripted([SettingsStatus::Satisfied]));
    let (handle, driver) = spawn(&source, &checker);

    let (observer, _) = recorder();
    handle.subscribe(observer).unwrap();
    handle.request_updates(LocationRequest::default()).unwrap();
    assert!(handle.snapshot().await.unwrap().streaming);

    let clone = handle.clone();
    drop(handle);
    drop(clone);
    driver.await.unwrap();
    assert_eq!(source.stops(), 1);
    assert!(source.live().is_empty());
}

fn holding_starts() -> Arc<MockSource> {
    let source = MockSource::default();
    source.hold_starts.store(true, Ordering::SeqCst);
    Arc::new(source)
}

#[tokio::test]
async fn detach_during_stream_start_stops_stream_once_started() {
    let source = holding_starts();
    let checker = Arc::new(MockChecker::scripted([SettingsStatus::Satisfied]));
    let (handle, _driver) = spawn(&source, &checker);

    let (observer, _) = recorder();
    let id = handle.subscribe(observer).unwrap();
    handle.request_updates(LocationRequest::default()).unwrap();
    assert_eq!(handle.snapshot().await.unwrap().phase, StartPhase::Starting);

    handle.unsubscribe(id).unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert!(!snapshot.streaming);
    assert_eq!(source.stops(), 0);

    source.release_start(Ok(()));
    handle.snapshot().await.unwrap();
    assert_eq!(source.starts(), 1);
    assert_eq!(source.stops(), 1);
    assert!(source.live().is_empty());
}

#[tokio::test]
async fn request_replaced_during_stream_start_keeps_only_new_stream() {
    let source = holding_starts();
    let checker = Arc::new(MockChecker::scripted([
        SettingsStatus::Satisfied,
        SettingsStatus::Satisfied,
    ]));
    let (handle, _driver) = spawn(&source, &checker);

    let (observer, _) = recorder();
    handle.subscribe(observer).unwrap();
    handle.request_updates(LocationRequest::default()).unwrap();
    handle.snapshot().await.unwrap();
    let old = source.sink().epoch();

    handle
        .request_updates(LocationRequest::new().with_priority(Priority::HighAccuracy))
        .unwrap();
    handle.snapshot().await.unwrap();
    assert_eq!(source.starts(), 2);
    let new = source.sink().epoch();
    assert_ne!(old, new);

    source.release_start(Ok(()));
    source.release_start(Ok(()));
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.phase, StartPhase::Streaming);
    assert_eq!(source.live(), vec![new]);
    assert_eq!(source.stops(), 1);
}

#[tokio::test]
async fn shutdown_stops_stream_whose_start_was_in_flight() {
    let source = holding_starts();
    let checker = Arc::new(MockChecker::scripted([SettingsStatus::Satisfied]));
    let (handle, driver) = spawn(&source, &checker);

    let (observer, _) = recorder();
    handle.subscribe(observer).unwrap();
    handle.request_updates(LocationRequest::default()).unwrap();
    assert_eq!(handle.snapshot().await.unwrap().phase, StartPhase::Starting);

    drop(handle);
    source.release_start(Ok(()));
    driver.await.unwrap();
    assert_eq!(source.stops(), 1);
    assert!(source.live().is_empty());
}

#[tokio::test]
async fn handle_reports_closed_service() {
    let source = Arc::new(MockSource::default());
    let checker = Arc::new(MockChecker::default());
    let (service, handle) =
        LiveLocationService::new(source, checker, LiveLocationConfig::default());
    drop(service);

    assert!(matches!(
        handle.request_updates(LocationRequest::default()),
        Err(ServiceError::Closed)
    ));
    assert!(matches!(handle.snapshot().await, Err(ServiceError::Closed)));
}
