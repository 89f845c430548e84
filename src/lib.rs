mod application;
mod domain;
mod infrastructure;

use application::commands::{
    AppState, DashboardResponse, SessionResponse, bind_focus_task_impl, check_in_task_impl,
    create_task_impl, delete_task_impl, get_focus_state_impl, get_radar_projection_impl,
    get_stats_impl, list_tasks_impl, login_impl, logout_impl, pause_focus_impl,
    refresh_dashboard_impl, register_user_impl, reset_focus_impl, restore_session_impl,
    set_focus_duration_impl, start_focus_impl,
};
use application::bootstrap::bootstrap_workspace;
use application::focus_service::FocusStateResponse;
use domain::models::{StatsSnapshot, Task};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
struct BootstrapResponse {
    workspace_root: String,
    config_dir: String,
    logs_dir: String,
}

#[tauri::command]
fn bootstrap(root: Option<String>) -> Result<BootstrapResponse, String> {
    let workspace_root = match root {
        Some(path) => PathBuf::from(path),
        None => std::env::current_dir().map_err(|error| error.to_string())?,
    };

    let result = bootstrap_workspace(&workspace_root).map_err(|error| error.to_string())?;
    Ok(BootstrapResponse {
        workspace_root: result.workspace_root.display().to_string(),
        config_dir: result.config_dir.display().to_string(),
        logs_dir: result.logs_dir.display().to_string(),
    })
}

#[tauri::command]
fn ping() -> &'static str {
    "pong"
}

#[tauri::command]
async fn register_user(
    state: tauri::State<'_, AppState>,
    username: String,
    password: String,
) -> Result<(), String> {
    register_user_impl(state.inner(), username, password)
        .await
        .map_err(|error| state.command_error("register_user", &error))
}

#[tauri::command]
async fn login(
    state: tauri::State<'_, AppState>,
    username: String,
    password: String,
) -> Result<SessionResponse, String> {
    login_impl(state.inner(), username, password)
        .await
        .map_err(|error| state.command_error("login", &error))
}

#[tauri::command]
async fn restore_session(
    state: tauri::State<'_, AppState>,
) -> Result<Option<SessionResponse>, String> {
    restore_session_impl(state.inner())
        .await
        .map_err(|error| state.command_error("restore_session", &error))
}

#[tauri::command]
fn logout(state: tauri::State<'_, AppState>) -> Result<(), String> {
    logout_impl(state.inner()).map_err(|error| state.command_error("logout", &error))
}

#[tauri::command]
async fn refresh_dashboard(
    state: tauri::State<'_, AppState>,
) -> Result<DashboardResponse, String> {
    refresh_dashboard_impl(state.inner())
        .await
        .map_err(|error| state.command_error("refresh_dashboard", &error))
}

#[tauri::command]
fn list_tasks(state: tauri::State<'_, AppState>) -> Result<Vec<Task>, String> {
    list_tasks_impl(state.inner()).map_err(|error| state.command_error("list_tasks", &error))
}

#[tauri::command]
fn get_stats(state: tauri::State<'_, AppState>) -> Result<StatsSnapshot, String> {
    get_stats_impl(state.inner()).map_err(|error| state.command_error("get_stats", &error))
}

#[tauri::command]
fn get_radar_projection(state: tauri::State<'_, AppState>) -> Result<[u32; 5], String> {
    get_radar_projection_impl(state.inner())
        .map_err(|error| state.command_error("get_radar_projection", &error))
}

#[tauri::command]
async fn create_task(
    state: tauri::State<'_, AppState>,
    title: String,
    description: Option<String>,
    target_type: String,
    target_value: u32,
) -> Result<i64, String> {
    create_task_impl(state.inner(), title, description, target_type, target_value)
        .await
        .map_err(|error| state.command_error("create_task", &error))
}

#[tauri::command]
async fn delete_task(state: tauri::State<'_, AppState>, task_id: i64) -> Result<(), String> {
    delete_task_impl(state.inner(), task_id)
        .await
        .map_err(|error| state.command_error("delete_task", &error))
}

#[tauri::command]
async fn check_in_task(state: tauri::State<'_, AppState>, task_id: i64) -> Result<(), String> {
    check_in_task_impl(state.inner(), task_id)
        .await
        .map_err(|error| state.command_error("check_in_task", &error))
}

#[tauri::command]
async fn start_focus(state: tauri::State<'_, AppState>) -> Result<FocusStateResponse, String> {
    start_focus_impl(state.inner())
        .await
        .map_err(|error| state.command_error("start_focus", &error))
}

#[tauri::command]
fn pause_focus(state: tauri::State<'_, AppState>) -> Result<FocusStateResponse, String> {
    pause_focus_impl(state.inner()).map_err(|error| state.command_error("pause_focus", &error))
}

#[tauri::command]
fn reset_focus(state: tauri::State<'_, AppState>) -> Result<FocusStateResponse, String> {
    reset_focus_impl(state.inner()).map_err(|error| state.command_error("reset_focus", &error))
}

#[tauri::command]
fn get_focus_state(state: tauri::State<'_, AppState>) -> Result<FocusStateResponse, String> {
    get_focus_state_impl(state.inner())
        .map_err(|error| state.command_error("get_focus_state", &error))
}

#[tauri::command]
fn set_focus_duration(
    state: tauri::State<'_, AppState>,
    minutes: u32,
) -> Result<FocusStateResponse, String> {
    set_focus_duration_impl(state.inner(), minutes)
        .map_err(|error| state.command_error("set_focus_duration", &error))
}

#[tauri::command]
fn bind_focus_task(
    state: tauri::State<'_, AppState>,
    task_id: Option<i64>,
) -> Result<FocusStateResponse, String> {
    bind_focus_task_impl(state.inner(), task_id)
        .map_err(|error| state.command_error("bind_focus_task", &error))
}

pub fn run() {
    let workspace_root = std::env::current_dir().expect("failed to resolve current directory");
    let app_state = AppState::new(workspace_root).expect("failed to initialize app state");

    tauri::Builder::default()
        .manage(app_state)
        .invoke_handler(tauri::generate_handler![
            ping,
            bootstrap,
            register_user,
            login,
            restore_session,
            logout,
            refresh_dashboard,
            list_tasks,
            get_stats,
            get_radar_projection,
            create_task,
            delete_task,
            check_in_task,
            start_focus,
            pause_focus,
            reset_focus,
            get_focus_state,
            set_focus_duration,
            bind_focus_task
        ])
        .run(tauri::generate_context!())
        .expect("failed to run tauri app");
}
