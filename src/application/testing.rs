use crate::domain::models::{CheckIn, StatsSnapshot, Task, TargetType};
use crate::infrastructure::error::ApiError;
use crate::infrastructure::habit_api_client::HabitApiClient;
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeFailure {
    Transport,
    Rejected,
    AuthExpired,
}

impl FakeFailure {
    fn into_error(self) -> ApiError {
        match self {
            Self::Transport => ApiError::Transport("fake network failure".to_string()),
            Self::Rejected => ApiError::Rejected {
                status: 400,
                reason: "fake rejection".to_string(),
            },
            Self::AuthExpired => ApiError::AuthExpired,
        }
    }
}

/// Scriptable in-memory stand-in for the HTTP API, with per-route call
/// counters.
#[derive(Default)]
pub struct FakeHabitApiClient {
    pub register_calls: AtomicUsize,
    pub login_calls: AtomicUsize,
    pub list_tasks_calls: AtomicUsize,
    pub create_task_calls: AtomicUsize,
    pub delete_task_calls: AtomicUsize,
    pub check_in_calls: AtomicUsize,
    pub fetch_stats_calls: AtomicUsize,
    pub submitted_check_ins: Mutex<Vec<(String, CheckIn)>>,
    login_failure: Mutex<Option<FakeFailure>>,
    check_in_failure: Mutex<Option<FakeFailure>>,
    refresh_failure: Mutex<Option<FakeFailure>>,
    refresh_delay: Mutex<Option<Duration>>,
    tasks: Mutex<Vec<Task>>,
    stats: Mutex<StatsSnapshot>,
}

impl FakeHabitApiClient {
    pub fn set_login_failure(&self, failure: Option<FakeFailure>) {
        *self.login_failure.lock().expect("login failure mutex poisoned") = failure;
    }

    pub fn set_check_in_failure(&self, failure: Option<FakeFailure>) {
        *self.check_in_failure.lock().expect("check-in failure mutex poisoned") = failure;
    }

    /// Applies to both halves of the combined tasks+stats read.
    pub fn set_refresh_failure(&self, failure: Option<FakeFailure>) {
        *self.refresh_failure.lock().expect("refresh failure mutex poisoned") = failure;
    }

    pub fn set_refresh_delay(&self, delay: Option<Duration>) {
        *self.refresh_delay.lock().expect("refresh delay mutex poisoned") = delay;
    }

    pub fn set_tasks(&self, tasks: Vec<Task>) {
        *self.tasks.lock().expect("tasks mutex poisoned") = tasks;
    }

    pub fn set_stats(&self, stats: StatsSnapshot) {
        *self.stats.lock().expect("stats mutex poisoned") = stats;
    }

    fn refresh_gate(&self) -> Result<Option<Duration>, ApiError> {
        if let Some(failure) = *self.refresh_failure.lock().expect("refresh failure mutex poisoned") {
            return Err(failure.into_error());
        }
        Ok(*self.refresh_delay.lock().expect("refresh delay mutex poisoned"))
    }
}

#[async_trait]
impl HabitApiClient for FakeHabitApiClient {
    async fn register(&self, _username: &str, _password: &str) -> Result<(), ApiError> {
        self.register_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn login(&self, username: &str, _password: &str) -> Result<String, ApiError> {
        self.login_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if let Some(failure) = *self.login_failure.lock().expect("login failure mutex poisoned") {
            return Err(failure.into_error());
        }
        Ok(format!("token-for-{username}"))
    }

    async fn list_tasks(&self, _access_token: &str) -> Result<Vec<Task>, ApiError> {
        self.list_tasks_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let delay = self.refresh_gate()?;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.tasks.lock().expect("tasks mutex poisoned").clone())
    }

    async fn create_task(
        &self,
        _access_token: &str,
        _title: &str,
        _description: Option<&str>,
        _target_type: TargetType,
        _target_value: u32,
    ) -> Result<i64, ApiError> {
        self.create_task_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(1)
    }

    async fn delete_task(&self, _access_token: &str, _task_id: i64) -> Result<(), ApiError> {
        self.delete_task_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn submit_check_in(&self, access_token: &str, checkin: &CheckIn) -> Result<(), ApiError> {
        self.check_in_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.submitted_check_ins
            .lock()
            .expect("check-in mutex poisoned")
            .push((access_token.to_string(), checkin.clone()));
        if let Some(failure) = *self.check_in_failure.lock().expect("check-in failure mutex poisoned") {
            return Err(failure.into_error());
        }
        Ok(())
    }

    async fn fetch_stats(&self, _access_token: &str) -> Result<StatsSnapshot, ApiError> {
        self.fetch_stats_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let delay = self.refresh_gate()?;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(*self.stats.lock().expect("stats mutex poisoned"))
    }
}

pub fn sample_task(id: i64, target_type: TargetType, target_value: u32) -> Task {
    Task {
        id,
        title: format!("Task {id}"),
        description: None,
        target_type,
        target_value,
        created_at: chrono::DateTime::parse_from_rfc3339("2026-03-02T08:00:00Z")
            .expect("valid datetime")
            .with_timezone(&chrono::Utc),
        progress: 0,
        is_completed: false,
    }
}
