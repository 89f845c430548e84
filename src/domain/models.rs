use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Count,
    Time,
}

/// A habit task as the server reports it. `progress` and `is_completed` are
/// computed server-side against today's check-ins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub target_type: TargetType,
    pub target_value: u32,
    pub created_at: DateTime<Utc>,
    pub progress: u32,
    pub is_completed: bool,
}

impl Task {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.title, "task.title")?;
        if self.target_value == 0 {
            return Err("task.target_value must be >= 1".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckInKind {
    TaskCheckin,
    Pomodoro,
}

/// An outbound check-in record. Built transiently when a work phase completes
/// or the user checks a task in; ownership transfers to the stats service with
/// the request, nothing is retained locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckIn {
    pub kind: CheckInKind,
    pub task_id: Option<i64>,
    pub duration_minutes: Option<u32>,
}

impl CheckIn {
    pub fn task_checkin(task_id: i64) -> Self {
        Self {
            kind: CheckInKind::TaskCheckin,
            task_id: Some(task_id),
            duration_minutes: None,
        }
    }

    pub fn pomodoro(duration_minutes: u32, task_id: Option<i64>) -> Self {
        Self {
            kind: CheckInKind::Pomodoro,
            task_id,
            duration_minutes: Some(duration_minutes),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self.kind {
            CheckInKind::TaskCheckin => {
                if self.task_id.is_none() {
                    return Err("checkin.task_id is required for task_checkin".to_string());
                }
            }
            CheckInKind::Pomodoro => {
                let Some(duration) = self.duration_minutes else {
                    return Err("checkin.duration_minutes is required for pomodoro".to_string());
                };
                if duration == 0 {
                    return Err("checkin.duration_minutes must be >= 1".to_string());
                }
            }
        }
        Ok(())
    }
}

/// Aggregate statistics as the server reports them. `discipline_score` and
/// `completion_rate` arrive pre-normalized to [0, 100]; the remaining fields
/// are raw counts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub today_checkins: u32,
    pub total_pomodoro_minutes: u32,
    pub discipline_score: u32,
    pub completion_rate: u32,
    pub current_streak: u32,
    pub completed_tasks_count: u32,
}

const RADAR_AXIS_MAX: u32 = 100;

impl StatsSnapshot {
    /// Maps the snapshot onto the five radar-chart axes, each clamped to
    /// [0, 100]. Axis order and multipliers are fixed presentation policy;
    /// the rendered chart depends on them bit-for-bit.
    pub fn radar_projection(&self) -> [u32; 5] {
        [
            self.discipline_score.min(RADAR_AXIS_MAX),
            self.total_pomodoro_minutes.min(RADAR_AXIS_MAX),
            self.today_checkins.saturating_mul(10).min(RADAR_AXIS_MAX),
            self.completion_rate.min(RADAR_AXIS_MAX),
            self.current_streak.saturating_mul(10).min(RADAR_AXIS_MAX),
        ]
    }
}

/// The authenticated client session persisted in the credential store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthSession {
    pub username: String,
    pub access_token: String,
}

impl AuthSession {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.username, "session.username")?;
        validate_non_empty(&self.access_token, "session.access_token")?;
        Ok(())
    }
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}
