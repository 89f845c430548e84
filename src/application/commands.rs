use crate::application::bootstrap::bootstrap_workspace;
use crate::application::checkin::CheckInRecorder;
use crate::application::dashboard::DashboardRefresher;
use crate::application::focus_service::{FocusService, FocusStateResponse};
use crate::application::session::SessionManager;
use crate::domain::models::{AuthSession, CheckIn, StatsSnapshot, Task, TargetType};
use crate::infrastructure::config::{read_api_base_url, read_timer_defaults};
use crate::infrastructure::credential_store::KeyringCredentialStore;
use crate::infrastructure::error::ApiError;
use crate::infrastructure::habit_api_client::{HabitApiClient, ReqwestHabitApiClient};
use chrono::Utc;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

type Store = KeyringCredentialStore;
type ApiClient = ReqwestHabitApiClient;

/// JSON-lines command log under `logs/commands.log`.
pub struct CommandLog {
    logs_dir: PathBuf,
    guard: Mutex<()>,
}

impl CommandLog {
    pub fn new(logs_dir: PathBuf) -> Self {
        Self {
            logs_dir,
            guard: Mutex::new(()),
        }
    }

    pub fn info(&self, command: &str, message: &str) {
        self.append("info", command, message);
    }

    pub fn error(&self, command: &str, message: &str) {
        self.append("error", command, message);
    }

    fn append(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }
}

/// In-memory client state: the authenticated session plus the last applied
/// tasks+stats snapshot. The server owns the records; this is a display
/// cache, never persisted.
#[derive(Debug, Default)]
pub struct RuntimeState {
    pub auth: Option<AuthSession>,
    pub tasks: Vec<Task>,
    pub stats: StatsSnapshot,
    pub applied_refresh_generation: u64,
}

pub fn lock_runtime(runtime: &Mutex<RuntimeState>) -> Result<MutexGuard<'_, RuntimeState>, ApiError> {
    runtime
        .lock()
        .map_err(|error| ApiError::InvalidConfig(format!("runtime lock poisoned: {error}")))
}

pub struct AppState {
    runtime: Arc<Mutex<RuntimeState>>,
    api_client: Arc<ApiClient>,
    session_manager: Arc<SessionManager<Store, ApiClient>>,
    recorder: Arc<CheckInRecorder<ApiClient>>,
    dashboard: Arc<DashboardRefresher<ApiClient>>,
    focus: FocusService<Store, ApiClient>,
    log: Arc<CommandLog>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, ApiError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;

        let base_url = read_api_base_url(&bootstrap.config_dir)?;
        let timer_defaults = read_timer_defaults(&bootstrap.config_dir)?;

        let api_client = Arc::new(ReqwestHabitApiClient::new(&base_url)?);
        let credential_store = Arc::new(KeyringCredentialStore::default());
        let runtime = Arc::new(Mutex::new(RuntimeState::default()));
        let log = Arc::new(CommandLog::new(bootstrap.logs_dir));

        let session_manager = Arc::new(SessionManager::new(
            Arc::clone(&credential_store),
            Arc::clone(&api_client),
        ));
        let recorder = Arc::new(CheckInRecorder::new(Arc::clone(&api_client)));
        let dashboard = Arc::new(DashboardRefresher::new(
            Arc::clone(&api_client),
            Arc::clone(&runtime),
        ));
        let focus = FocusService::new(
            Arc::clone(&recorder),
            Arc::clone(&dashboard),
            Arc::clone(&session_manager),
            Arc::clone(&runtime),
            Arc::clone(&log),
            timer_defaults,
            Duration::from_secs(1),
        );

        Ok(Self {
            runtime,
            api_client,
            session_manager,
            recorder,
            dashboard,
            focus,
            log,
        })
    }

    pub fn command_error(&self, command: &str, error: &ApiError) -> String {
        self.log.error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.log.info(command, message);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub username: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardResponse {
    pub tasks: Vec<Task>,
    pub stats: StatsSnapshot,
    pub radar: [u32; 5],
}

fn required_access_token(state: &AppState) -> Result<String, ApiError> {
    let runtime = lock_runtime(&state.runtime)?;
    runtime
        .auth
        .as_ref()
        .map(|auth| auth.access_token.clone())
        .ok_or_else(|| ApiError::InvalidConfig("no authenticated session; log in first".to_string()))
}

/// Ends the authenticated session: stored credential, cached dashboard, and
/// the in-flight focus session all go.
fn end_session(state: &AppState) -> Result<(), ApiError> {
    state.session_manager.logout()?;
    {
        let mut runtime = lock_runtime(&state.runtime)?;
        runtime.auth = None;
        runtime.tasks.clear();
        runtime.stats = StatsSnapshot::default();
    }
    state.focus.reset()?;
    Ok(())
}

/// Auth expiry is never handled silently: the whole session is torn down and
/// the error is handed back to the caller.
fn escalate_if_auth_expired(state: &AppState, command: &str, error: ApiError) -> ApiError {
    if matches!(error, ApiError::AuthExpired) {
        if let Err(teardown_error) = end_session(state) {
            state
                .log
                .error(command, &format!("session teardown failed: {teardown_error}"));
        } else {
            state.log.error(command, "authentication expired; session ended");
        }
    }
    error
}

/// Post-mutation dashboard refresh. Failures are logged, not surfaced: the
/// mutation itself already succeeded.
async fn refresh_after_mutation(state: &AppState, command: &str, access_token: &str) {
    if let Err(error) = state.dashboard.refresh(access_token).await {
        let error = escalate_if_auth_expired(state, command, error);
        state
            .log
            .error(command, &format!("dashboard refresh failed: {error}"));
    }
}

fn dashboard_response(state: &AppState) -> Result<DashboardResponse, ApiError> {
    let runtime = lock_runtime(&state.runtime)?;
    Ok(DashboardResponse {
        tasks: runtime.tasks.clone(),
        stats: runtime.stats,
        radar: runtime.stats.radar_projection(),
    })
}

pub async fn register_user_impl(
    state: &AppState,
    username: String,
    password: String,
) -> Result<(), ApiError> {
    state.session_manager.register(&username, &password).await?;
    state.log_info("register_user", &format!("registered username={}", username.trim()));
    Ok(())
}

pub async fn login_impl(
    state: &AppState,
    username: String,
    password: String,
) -> Result<SessionResponse, ApiError> {
    let session = state.session_manager.login(&username, &password).await?;
    let access_token = session.access_token.clone();
    let username = session.username.clone();
    {
        let mut runtime = lock_runtime(&state.runtime)?;
        runtime.auth = Some(session);
    }
    refresh_after_mutation(state, "login", &access_token).await;

    state.log_info("login", &format!("logged in username={username}"));
    Ok(SessionResponse { username })
}

pub async fn restore_session_impl(state: &AppState) -> Result<Option<SessionResponse>, ApiError> {
    let Some(session) = state.session_manager.restore()? else {
        return Ok(None);
    };
    let access_token = session.access_token.clone();
    let username = session.username.clone();
    {
        let mut runtime = lock_runtime(&state.runtime)?;
        runtime.auth = Some(session);
    }

    if let Err(error) = state.dashboard.refresh(&access_token).await {
        let error = escalate_if_auth_expired(state, "restore_session", error);
        if matches!(error, ApiError::AuthExpired) {
            return Ok(None);
        }
        // Stale cache is fine; the session itself is still usable.
        state
            .log
            .error("restore_session", &format!("dashboard refresh failed: {error}"));
    }

    state.log_info("restore_session", &format!("restored username={username}"));
    Ok(Some(SessionResponse { username }))
}

pub fn logout_impl(state: &AppState) -> Result<(), ApiError> {
    end_session(state)?;
    state.log_info("logout", "session ended");
    Ok(())
}

pub async fn refresh_dashboard_impl(state: &AppState) -> Result<DashboardResponse, ApiError> {
    let access_token = required_access_token(state)?;
    state
        .dashboard
        .refresh(&access_token)
        .await
        .map_err(|error| escalate_if_auth_expired(state, "refresh_dashboard", error))?;
    dashboard_response(state)
}

pub fn list_tasks_impl(state: &AppState) -> Result<Vec<Task>, ApiError> {
    let runtime = lock_runtime(&state.runtime)?;
    Ok(runtime.tasks.clone())
}

pub fn get_stats_impl(state: &AppState) -> Result<StatsSnapshot, ApiError> {
    let runtime = lock_runtime(&state.runtime)?;
    Ok(runtime.stats)
}

pub fn get_radar_projection_impl(state: &AppState) -> Result<[u32; 5], ApiError> {
    let runtime = lock_runtime(&state.runtime)?;
    Ok(runtime.stats.radar_projection())
}

fn parse_target_type(raw: &str) -> Result<TargetType, ApiError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "count" => Ok(TargetType::Count),
        "time" => Ok(TargetType::Time),
        other => Err(ApiError::InvalidConfig(format!("unknown target_type: {other}"))),
    }
}

pub async fn create_task_impl(
    state: &AppState,
    title: String,
    description: Option<String>,
    target_type: String,
    target_value: u32,
) -> Result<i64, ApiError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ApiError::InvalidConfig("title must not be empty".to_string()));
    }
    if target_value == 0 {
        return Err(ApiError::InvalidConfig("target_value must be >= 1".to_string()));
    }
    let target_type = parse_target_type(&target_type)?;
    let description = description
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());

    let access_token = required_access_token(state)?;
    let task_id = state
        .api_client
        .create_task(&access_token, title, description, target_type, target_value)
        .await
        .map_err(|error| escalate_if_auth_expired(state, "create_task", error))?;
    refresh_after_mutation(state, "create_task", &access_token).await;

    state.log_info("create_task", &format!("created task_id={task_id}"));
    Ok(task_id)
}

pub async fn delete_task_impl(state: &AppState, task_id: i64) -> Result<(), ApiError> {
    let access_token = required_access_token(state)?;
    state
        .api_client
        .delete_task(&access_token, task_id)
        .await
        .map_err(|error| escalate_if_auth_expired(state, "delete_task", error))?;
    // The focus session's binding is a weak reference and may now dangle;
    // it is not cleared here.
    refresh_after_mutation(state, "delete_task", &access_token).await;

    state.log_info("delete_task", &format!("deleted task_id={task_id}"));
    Ok(())
}

pub async fn check_in_task_impl(state: &AppState, task_id: i64) -> Result<(), ApiError> {
    let access_token = required_access_token(state)?;
    state
        .recorder
        .record(&access_token, &CheckIn::task_checkin(task_id))
        .await
        .map_err(|error| escalate_if_auth_expired(state, "check_in_task", error))?;
    refresh_after_mutation(state, "check_in_task", &access_token).await;

    state.log_info("check_in_task", &format!("checked in task_id={task_id}"));
    Ok(())
}

pub async fn start_focus_impl(state: &AppState) -> Result<FocusStateResponse, ApiError> {
    state.focus.start().await
}

pub fn pause_focus_impl(state: &AppState) -> Result<FocusStateResponse, ApiError> {
    state.focus.pause()
}

pub fn reset_focus_impl(state: &AppState) -> Result<FocusStateResponse, ApiError> {
    state.focus.reset()
}

pub fn get_focus_state_impl(state: &AppState) -> Result<FocusStateResponse, ApiError> {
    state.focus.snapshot()
}

pub fn set_focus_duration_impl(
    state: &AppState,
    minutes: u32,
) -> Result<FocusStateResponse, ApiError> {
    state.focus.set_work_minutes(minutes)
}

pub fn bind_focus_task_impl(
    state: &AppState,
    task_id: Option<i64>,
) -> Result<FocusStateResponse, ApiError> {
    let Some(task_id) = task_id else {
        return state.focus.bind_task(None);
    };

    let task = {
        let runtime = lock_runtime(&state.runtime)?;
        runtime.tasks.iter().find(|task| task.id == task_id).cloned()
    };
    let task = task.ok_or_else(|| ApiError::InvalidConfig(format!("task not found: {task_id}")))?;
    state.focus.bind_task(Some(&task))
}
