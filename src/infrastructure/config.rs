use crate::domain::focus::{DEFAULT_BREAK_MINUTES, DEFAULT_WORK_MINUTES};
use crate::infrastructure::error::ApiError;
use crate::infrastructure::habit_api_client::DEFAULT_API_BASE_URL;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";

/// Focus-timer defaults loaded from `app.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerDefaults {
    pub work_minutes: u32,
    pub break_minutes: u32,
    pub auto_start_break: bool,
}

impl Default for TimerDefaults {
    fn default() -> Self {
        Self {
            work_minutes: DEFAULT_WORK_MINUTES,
            break_minutes: DEFAULT_BREAK_MINUTES,
            auto_start_break: false,
        }
    }
}

fn default_app_config() -> serde_json::Value {
    serde_json::json!({
        "schema": 1,
        "appName": "HabitDash",
        "apiBaseUrl": DEFAULT_API_BASE_URL,
        "workMinutes": DEFAULT_WORK_MINUTES,
        "breakMinutes": DEFAULT_BREAK_MINUTES,
        "autoStartBreak": false
    })
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), ApiError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&default_app_config())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, ApiError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| ApiError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(ApiError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn read_api_base_url(config_dir: &Path) -> Result<String, ApiError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    let base_url = app
        .get("apiBaseUrl")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_API_BASE_URL);
    Ok(base_url.to_string())
}

pub fn read_timer_defaults(config_dir: &Path) -> Result<TimerDefaults, ApiError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    let defaults = TimerDefaults::default();

    let work_minutes = app
        .get("workMinutes")
        .and_then(serde_json::Value::as_u64)
        .filter(|value| *value > 0)
        .map_or(defaults.work_minutes, |value| value.min(u32::MAX as u64) as u32);
    let break_minutes = app
        .get("breakMinutes")
        .and_then(serde_json::Value::as_u64)
        .filter(|value| *value > 0)
        .map_or(defaults.break_minutes, |value| value.min(u32::MAX as u64) as u32);
    let auto_start_break = app
        .get("autoStartBreak")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(defaults.auto_start_break);

    Ok(TimerDefaults {
        work_minutes,
        break_minutes,
        auto_start_break,
    })
}
