use crate::application::checkin::CheckInRecorder;
use crate::application::commands::{CommandLog, RuntimeState};
use crate::application::dashboard::DashboardRefresher;
use crate::application::session::SessionManager;
use crate::domain::focus::{FocusSession, TickOutcome, format_mm_ss};
use crate::domain::models::{CheckIn, StatsSnapshot, Task};
use crate::infrastructure::config::TimerDefaults;
use crate::infrastructure::credential_store::CredentialStore;
use crate::infrastructure::error::ApiError;
use crate::infrastructure::habit_api_client::HabitApiClient;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FocusStateResponse {
    pub phase: String,
    pub running: bool,
    pub remaining_seconds: u32,
    pub display: String,
    pub work_minutes: u32,
    pub bound_task_id: Option<i64>,
    pub last_dispatch_error: Option<String>,
}

/// Drives the focus state machine with a real clock and dispatches the
/// check-in when a work phase completes.
///
/// The service owns at most one live ticker task: spawning always aborts the
/// previous handle first, and pause/reset abort it outright, so a stale
/// ticker can never double the countdown speed. An issued check-in request is
/// never cancelled; dispatch runs on its own task so tearing the clock down
/// mid-flight cannot abort it.
pub struct FocusService<S, C>
where
    S: CredentialStore,
    C: HabitApiClient,
{
    session: Arc<Mutex<FocusSession>>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    recorder: Arc<CheckInRecorder<C>>,
    dashboard: Arc<DashboardRefresher<C>>,
    session_manager: Arc<SessionManager<S, C>>,
    runtime: Arc<Mutex<RuntimeState>>,
    log: Arc<CommandLog>,
    last_dispatch_error: Arc<Mutex<Option<String>>>,
    tick_interval: Duration,
    auto_start_break: bool,
}

impl<S, C> Clone for FocusService<S, C>
where
    S: CredentialStore,
    C: HabitApiClient,
{
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            ticker: Arc::clone(&self.ticker),
            recorder: Arc::clone(&self.recorder),
            dashboard: Arc::clone(&self.dashboard),
            session_manager: Arc::clone(&self.session_manager),
            runtime: Arc::clone(&self.runtime),
            log: Arc::clone(&self.log),
            last_dispatch_error: Arc::clone(&self.last_dispatch_error),
            tick_interval: self.tick_interval,
            auto_start_break: self.auto_start_break,
        }
    }
}

impl<S, C> FocusService<S, C>
where
    S: CredentialStore + 'static,
    C: HabitApiClient + 'static,
{
    pub fn new(
        recorder: Arc<CheckInRecorder<C>>,
        dashboard: Arc<DashboardRefresher<C>>,
        session_manager: Arc<SessionManager<S, C>>,
        runtime: Arc<Mutex<RuntimeState>>,
        log: Arc<CommandLog>,
        defaults: TimerDefaults,
        tick_interval: Duration,
    ) -> Self {
        Self {
            session: Arc::new(Mutex::new(FocusSession::with_durations(
                defaults.work_minutes,
                defaults.break_minutes,
            ))),
            ticker: Arc::new(Mutex::new(None)),
            recorder,
            dashboard,
            session_manager,
            runtime,
            log,
            last_dispatch_error: Arc::new(Mutex::new(None)),
            tick_interval,
            auto_start_break: defaults.auto_start_break,
        }
    }

    pub fn snapshot(&self) -> Result<FocusStateResponse, ApiError> {
        let session = self.lock_session()?;
        let last_dispatch_error = self.lock_last_error()?.clone();
        Ok(to_focus_state_response(&session, last_dispatch_error))
    }

    /// Starts the countdown, entering the work phase from idle or resuming
    /// the current phase. Safe to call while already running: the old ticker
    /// is replaced, never doubled.
    pub async fn start(&self) -> Result<FocusStateResponse, ApiError> {
        {
            let mut session = self.lock_session()?;
            session.start();
        }
        self.spawn_ticker()?;
        self.snapshot()
    }

    pub fn pause(&self) -> Result<FocusStateResponse, ApiError> {
        {
            let mut session = self.lock_session()?;
            session.pause();
        }
        self.cancel_ticker()?;
        self.snapshot()
    }

    pub fn reset(&self) -> Result<FocusStateResponse, ApiError> {
        {
            let mut session = self.lock_session()?;
            session.reset();
        }
        self.cancel_ticker()?;
        *self.lock_last_error()? = None;
        self.snapshot()
    }

    /// Binds (or unbinds) the session's task. A no-op unless the session is
    /// idle; the returned snapshot tells the caller what actually happened.
    pub fn bind_task(&self, task: Option<&Task>) -> Result<FocusStateResponse, ApiError> {
        {
            let mut session = self.lock_session()?;
            session.bind_task(task);
        }
        self.snapshot()
    }

    pub fn set_work_minutes(&self, minutes: u32) -> Result<FocusStateResponse, ApiError> {
        {
            let mut session = self.lock_session()?;
            session
                .set_work_minutes(minutes)
                .map_err(ApiError::InvalidConfig)?;
        }
        self.snapshot()
    }

    fn spawn_ticker(&self) -> Result<(), ApiError> {
        let mut guard = self
            .ticker
            .lock()
            .map_err(|error| ApiError::InvalidConfig(format!("ticker lock poisoned: {error}")))?;
        if let Some(handle) = guard.take() {
            handle.abort();
        }
        let service = self.clone();
        *guard = Some(tokio::spawn(service.run_ticker()));
        Ok(())
    }

    fn cancel_ticker(&self) -> Result<(), ApiError> {
        let mut guard = self
            .ticker
            .lock()
            .map_err(|error| ApiError::InvalidConfig(format!("ticker lock poisoned: {error}")))?;
        if let Some(handle) = guard.take() {
            handle.abort();
        }
        Ok(())
    }

    async fn run_ticker(self) {
        let mut interval = time::interval(self.tick_interval);
        // The first interval tick completes immediately; swallow it so the
        // countdown starts a full period after start().
        interval.tick().await;
        loop {
            interval.tick().await;
            let outcome = {
                let Ok(mut session) = self.session.lock() else {
                    break;
                };
                session.tick()
            };
            match outcome {
                TickOutcome::Skipped => break,
                TickOutcome::Counting => {}
                TickOutcome::WorkComplete {
                    work_minutes,
                    task_id,
                } => {
                    let _ = tokio::spawn(self.clone().dispatch_completed_work(work_minutes, task_id));
                    if self.auto_start_break {
                        if let Ok(mut session) = self.session.lock() {
                            session.start();
                        }
                        interval = time::interval(self.tick_interval);
                        interval.tick().await;
                    } else {
                        break;
                    }
                }
                TickOutcome::BreakComplete => break,
            }
        }
    }

    /// Records the finished work phase. The phase transition has already
    /// happened; whatever this dispatch does, the session stays in break.
    async fn dispatch_completed_work(self, work_minutes: u32, task_id: Option<i64>) {
        let access_token = self
            .runtime
            .lock()
            .ok()
            .and_then(|runtime| runtime.auth.as_ref().map(|auth| auth.access_token.clone()));
        let Some(access_token) = access_token else {
            self.log.error(
                "focus_tick",
                "work phase completed without an authenticated session; check-in dropped",
            );
            self.set_last_error(Some("not logged in; focus session was not recorded".to_string()));
            return;
        };

        let checkin = CheckIn::pomodoro(work_minutes, task_id);
        match self.recorder.record(&access_token, &checkin).await {
            Ok(()) => {
                self.set_last_error(None);
                self.log.info(
                    "focus_tick",
                    &format!("recorded {work_minutes}-minute focus session"),
                );
                match self.dashboard.refresh(&access_token).await {
                    Ok(()) => {}
                    Err(ApiError::AuthExpired) => self.teardown_authenticated_session(),
                    Err(error) => self.log.error(
                        "focus_tick",
                        &format!("dashboard refresh after check-in failed: {error}"),
                    ),
                }
            }
            Err(ApiError::AuthExpired) => {
                self.set_last_error(Some(
                    "authentication expired; focus session was not recorded".to_string(),
                ));
                self.teardown_authenticated_session();
            }
            Err(error) => {
                // At-most-once delivery: the check-in is lost, the break
                // proceeds, the user is told.
                self.set_last_error(Some(error.to_string()));
                self.log
                    .error("focus_tick", &format!("check-in dispatch failed: {error}"));
            }
        }
    }

    fn teardown_authenticated_session(&self) {
        if let Err(error) = self.session_manager.logout() {
            self.log.error(
                "focus_tick",
                &format!("failed clearing stored credentials: {error}"),
            );
        }
        if let Ok(mut runtime) = self.runtime.lock() {
            runtime.auth = None;
            runtime.tasks.clear();
            runtime.stats = StatsSnapshot::default();
        }
        if let Ok(mut session) = self.session.lock() {
            session.reset();
        }
        let _ = self.cancel_ticker();
        self.log
            .error("focus_tick", "authentication expired; session torn down");
    }

    fn set_last_error(&self, message: Option<String>) {
        if let Ok(mut guard) = self.last_dispatch_error.lock() {
            *guard = message;
        }
    }

    fn lock_session(&self) -> Result<MutexGuard<'_, FocusSession>, ApiError> {
        self.session
            .lock()
            .map_err(|error| ApiError::InvalidConfig(format!("focus session lock poisoned: {error}")))
    }

    fn lock_last_error(&self) -> Result<MutexGuard<'_, Option<String>>, ApiError> {
        self.last_dispatch_error
            .lock()
            .map_err(|error| ApiError::InvalidConfig(format!("dispatch error lock poisoned: {error}")))
    }
}

fn to_focus_state_response(
    session: &FocusSession,
    last_dispatch_error: Option<String>,
) -> FocusStateResponse {
    FocusStateResponse {
        phase: session.phase().as_str().to_string(),
        running: session.running(),
        remaining_seconds: session.remaining_seconds(),
        display: format_mm_ss(session.remaining_seconds()),
        work_minutes: session.work_minutes(),
        bound_task_id: session.bound_task_id(),
        last_dispatch_error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{FakeFailure, FakeHabitApiClient};
    use crate::domain::models::{AuthSession, CheckInKind};
    use crate::infrastructure::credential_store::InMemoryCredentialStore;
    use std::sync::atomic::Ordering;

    struct Harness {
        client: Arc<FakeHabitApiClient>,
        store: Arc<InMemoryCredentialStore>,
        runtime: Arc<Mutex<RuntimeState>>,
        service: FocusService<InMemoryCredentialStore, FakeHabitApiClient>,
        _logs: tempfile::TempDir,
    }

    fn harness(defaults: TimerDefaults) -> Harness {
        let client = Arc::new(FakeHabitApiClient::default());
        let store = Arc::new(InMemoryCredentialStore::default());
        let runtime = Arc::new(Mutex::new(RuntimeState::default()));
        let logs = tempfile::tempdir().expect("temp dir");
        let log = Arc::new(CommandLog::new(logs.path().to_path_buf()));

        let session = AuthSession {
            username: "nene".to_string(),
            access_token: "jwt".to_string(),
        };
        store.save_session(&session).expect("save session");
        runtime.lock().expect("runtime").auth = Some(session);

        let recorder = Arc::new(CheckInRecorder::new(Arc::clone(&client)));
        let dashboard = Arc::new(DashboardRefresher::new(
            Arc::clone(&client),
            Arc::clone(&runtime),
        ));
        let session_manager = Arc::new(SessionManager::new(
            Arc::clone(&store),
            Arc::clone(&client),
        ));
        let service = FocusService::new(
            recorder,
            dashboard,
            session_manager,
            Arc::clone(&runtime),
            log,
            defaults,
            Duration::from_millis(1),
        );

        Harness {
            client,
            store,
            runtime,
            service,
            _logs: logs,
        }
    }

    fn one_minute_defaults() -> TimerDefaults {
        TimerDefaults {
            work_minutes: 1,
            break_minutes: 5,
            auto_start_break: false,
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within 5 seconds");
    }

    #[tokio::test]
    async fn completed_work_phase_dispatches_checkin_and_refreshes() {
        let harness = harness(one_minute_defaults());
        harness.client.set_stats(StatsSnapshot {
            total_pomodoro_minutes: 1,
            ..StatsSnapshot::default()
        });

        harness.service.start().await.expect("start");
        let client = Arc::clone(&harness.client);
        wait_until(move || client.check_in_calls.load(Ordering::SeqCst) == 1).await;
        let runtime = Arc::clone(&harness.runtime);
        wait_until(move || {
            runtime.lock().expect("runtime").stats.total_pomodoro_minutes == 1
        })
        .await;

        let submitted = harness
            .client
            .submitted_check_ins
            .lock()
            .expect("submitted check-ins");
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].0, "jwt");
        assert_eq!(submitted[0].1.kind, CheckInKind::Pomodoro);
        assert_eq!(submitted[0].1.duration_minutes, Some(1));

        let snapshot = harness.service.snapshot().expect("snapshot");
        assert_eq!(snapshot.phase, "break");
        assert!(!snapshot.running);
        assert_eq!(snapshot.remaining_seconds, 300);
        assert_eq!(snapshot.last_dispatch_error, None);
    }

    #[tokio::test]
    async fn failed_dispatch_still_enters_break() {
        let harness = harness(one_minute_defaults());
        harness.client.set_check_in_failure(Some(FakeFailure::Transport));

        harness.service.start().await.expect("start");
        let service = harness.service.clone();
        wait_until(move || {
            service
                .snapshot()
                .expect("snapshot")
                .last_dispatch_error
                .is_some()
        })
        .await;

        let snapshot = harness.service.snapshot().expect("snapshot");
        assert_eq!(snapshot.phase, "break");
        assert_eq!(snapshot.remaining_seconds, 300);
        assert_eq!(harness.client.check_in_calls.load(Ordering::SeqCst), 1);
        // The dashboard is never refreshed after a failed dispatch.
        assert_eq!(harness.client.fetch_stats_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn auth_expiry_during_dispatch_tears_the_session_down() {
        let harness = harness(one_minute_defaults());
        harness.client.set_check_in_failure(Some(FakeFailure::AuthExpired));

        harness.service.start().await.expect("start");
        let runtime = Arc::clone(&harness.runtime);
        wait_until(move || runtime.lock().expect("runtime").auth.is_none()).await;

        assert_eq!(harness.store.load_session().expect("load session"), None);
        let snapshot = harness.service.snapshot().expect("snapshot");
        assert_eq!(snapshot.phase, "idle");
        assert!(!snapshot.running);
    }

    #[tokio::test]
    async fn pause_stops_the_countdown_even_after_repeated_starts() {
        let harness = harness(TimerDefaults::default());

        harness.service.start().await.expect("start");
        harness.service.start().await.expect("restart");
        time::sleep(Duration::from_millis(30)).await;
        let paused = harness.service.pause().expect("pause");
        assert!(!paused.running);

        time::sleep(Duration::from_millis(100)).await;
        let later = harness.service.snapshot().expect("snapshot");
        assert_eq!(later.remaining_seconds, paused.remaining_seconds);
        assert_eq!(later.phase, "work");
    }

    #[tokio::test]
    async fn reset_returns_to_a_full_idle_countdown() {
        let harness = harness(TimerDefaults::default());
        harness.service.start().await.expect("start");
        time::sleep(Duration::from_millis(30)).await;

        let snapshot = harness.service.reset().expect("reset");
        assert_eq!(snapshot.phase, "idle");
        assert!(!snapshot.running);
        assert_eq!(snapshot.remaining_seconds, 1500);
        assert_eq!(snapshot.last_dispatch_error, None);

        time::sleep(Duration::from_millis(50)).await;
        let later = harness.service.snapshot().expect("snapshot");
        assert_eq!(later.remaining_seconds, 1500);
    }

    #[tokio::test]
    async fn auto_start_break_keeps_the_clock_running() {
        let harness = harness(TimerDefaults {
            work_minutes: 1,
            break_minutes: 5,
            auto_start_break: true,
        });

        harness.service.start().await.expect("start");
        let service = harness.service.clone();
        wait_until(move || {
            let snapshot = service.snapshot().expect("snapshot");
            snapshot.phase == "break" && snapshot.running
        })
        .await;

        assert_eq!(harness.client.check_in_calls.load(Ordering::SeqCst), 1);
    }
}
