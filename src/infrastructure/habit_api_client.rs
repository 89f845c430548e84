use crate::domain::models::{CheckIn, CheckInKind, StatsSnapshot, Task, TargetType};
use crate::infrastructure::error::ApiError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::{Client, StatusCode};
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:5000";

/// The habit-tracker HTTP API: auth, task CRUD, check-in submission, and the
/// aggregate statistics read. One method per server route.
#[async_trait]
pub trait HabitApiClient: Send + Sync {
    async fn register(&self, username: &str, password: &str) -> Result<(), ApiError>;

    /// Exchanges credentials for a bearer access token.
    async fn login(&self, username: &str, password: &str) -> Result<String, ApiError>;

    async fn list_tasks(&self, access_token: &str) -> Result<Vec<Task>, ApiError>;

    async fn create_task(
        &self,
        access_token: &str,
        title: &str,
        description: Option<&str>,
        target_type: TargetType,
        target_value: u32,
    ) -> Result<i64, ApiError>;

    async fn delete_task(&self, access_token: &str, task_id: i64) -> Result<(), ApiError>;

    async fn submit_check_in(&self, access_token: &str, checkin: &CheckIn) -> Result<(), ApiError>;

    async fn fetch_stats(&self, access_token: &str) -> Result<StatsSnapshot, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestHabitApiClient {
    client: Client,
    base_url: Url,
}

impl ReqwestHabitApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url.trim())
            .map_err(|error| ApiError::InvalidConfig(format!("invalid api base url: {error}")))?;
        Ok(Self {
            client: Client::new(),
            base_url,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        {
            let mut parts = url
                .path_segments_mut()
                .map_err(|_| ApiError::InvalidConfig("api base URL cannot be a base".to_string()))?;
            parts.pop_if_empty();
            for segment in segments {
                parts.push(segment);
            }
        }
        Ok(url)
    }
}

#[derive(Debug, serde::Serialize)]
struct CredentialsRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, serde::Deserialize)]
struct LoginResponsePayload {
    access_token: String,
}

#[derive(Debug, serde::Deserialize)]
struct TaskPayload {
    id: i64,
    title: String,
    description: Option<String>,
    target_type: TargetType,
    target_value: u32,
    created_at: String,
    #[serde(default)]
    progress: u32,
    #[serde(default)]
    is_completed: bool,
}

#[derive(Debug, serde::Serialize)]
struct CreateTaskRequest<'a> {
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    target_type: TargetType,
    target_value: u32,
}

#[derive(Debug, serde::Deserialize)]
struct CreateTaskResponsePayload {
    id: i64,
}

#[derive(Debug, serde::Serialize)]
struct CheckInRequest {
    #[serde(rename = "type")]
    kind: CheckInKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<u32>,
}

#[derive(Debug, serde::Deserialize)]
struct ErrorPayload {
    msg: Option<String>,
}

fn transport_error(context: &str, error: reqwest::Error) -> ApiError {
    ApiError::Transport(format!("{context}: {error}"))
}

fn rejection_error(status: StatusCode, body: &str) -> ApiError {
    let reason = serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .and_then(|payload| payload.msg)
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("http {}", status.as_u16())
            } else {
                trimmed.to_string()
            }
        });
    ApiError::Rejected {
        status: status.as_u16(),
        reason,
    }
}

/// Error mapping for bearer-authenticated routes: 401 always means the token
/// is no longer valid, everything else is an ordinary rejection.
fn authed_error(status: StatusCode, body: &str) -> ApiError {
    if status == StatusCode::UNAUTHORIZED {
        ApiError::AuthExpired
    } else {
        rejection_error(status, body)
    }
}

/// The server emits ISO-8601 timestamps that may lack a UTC offset
/// (`datetime.isoformat()` on a naive value); accept both forms.
fn parse_created_at(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(value) = DateTime::parse_from_rfc3339(raw) {
        return Ok(value.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|value| value.and_utc())
        .map_err(|error| {
            ApiError::Rejected {
                status: 200,
                reason: format!("invalid created_at timestamp {raw:?}: {error}"),
            }
        })
}

fn task_from_payload(payload: TaskPayload) -> Result<Task, ApiError> {
    Ok(Task {
        id: payload.id,
        title: payload.title,
        description: payload.description,
        target_type: payload.target_type,
        target_value: payload.target_value,
        created_at: parse_created_at(&payload.created_at)?,
        progress: payload.progress,
        is_completed: payload.is_completed,
    })
}

#[async_trait]
impl HabitApiClient for ReqwestHabitApiClient {
    async fn register(&self, username: &str, password: &str) -> Result<(), ApiError> {
        let endpoint = self.endpoint(&["auth", "register"])?;
        let response = self
            .client
            .post(endpoint)
            .json(&CredentialsRequest { username, password })
            .send()
            .await
            .map_err(|error| transport_error("network error while registering", error))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| transport_error("failed reading register response", error))?;
        if !status.is_success() {
            return Err(rejection_error(status, &body));
        }
        Ok(())
    }

    async fn login(&self, username: &str, password: &str) -> Result<String, ApiError> {
        let endpoint = self.endpoint(&["auth", "login"])?;
        let response = self
            .client
            .post(endpoint)
            .json(&CredentialsRequest { username, password })
            .send()
            .await
            .map_err(|error| transport_error("network error while logging in", error))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| transport_error("failed reading login response", error))?;
        // A 401 here is a bad username/password, not an expired session.
        if !status.is_success() {
            return Err(rejection_error(status, &body));
        }

        let parsed: LoginResponsePayload = serde_json::from_str(&body).map_err(|error| {
            ApiError::Rejected {
                status: status.as_u16(),
                reason: format!("invalid login payload: {error}"),
            }
        })?;
        if parsed.access_token.trim().is_empty() {
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                reason: "login response did not include an access token".to_string(),
            });
        }
        Ok(parsed.access_token)
    }

    async fn list_tasks(&self, access_token: &str) -> Result<Vec<Task>, ApiError> {
        let endpoint = self.endpoint(&["api", "tasks"])?;
        let response = self
            .client
            .get(endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|error| transport_error("network error while listing tasks", error))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| transport_error("failed reading task list response", error))?;
        if !status.is_success() {
            return Err(authed_error(status, &body));
        }

        let parsed: Vec<TaskPayload> = serde_json::from_str(&body).map_err(|error| {
            ApiError::Rejected {
                status: status.as_u16(),
                reason: format!("invalid task list payload: {error}"),
            }
        })?;
        parsed.into_iter().map(task_from_payload).collect()
    }

    async fn create_task(
        &self,
        access_token: &str,
        title: &str,
        description: Option<&str>,
        target_type: TargetType,
        target_value: u32,
    ) -> Result<i64, ApiError> {
        let endpoint = self.endpoint(&["api", "tasks"])?;
        let request = CreateTaskRequest {
            title,
            description,
            target_type,
            target_value,
        };
        let response = self
            .client
            .post(endpoint)
            .bearer_auth(access_token)
            .json(&request)
            .send()
            .await
            .map_err(|error| transport_error("network error while creating task", error))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| transport_error("failed reading task create response", error))?;
        if !status.is_success() {
            return Err(authed_error(status, &body));
        }

        let parsed: CreateTaskResponsePayload = serde_json::from_str(&body).map_err(|error| {
            ApiError::Rejected {
                status: status.as_u16(),
                reason: format!("invalid task create payload: {error}"),
            }
        })?;
        Ok(parsed.id)
    }

    async fn delete_task(&self, access_token: &str, task_id: i64) -> Result<(), ApiError> {
        let endpoint = self.endpoint(&["api", "tasks", &task_id.to_string()])?;
        let response = self
            .client
            .delete(endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|error| transport_error("network error while deleting task", error))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| transport_error("failed reading task delete response", error))?;
        if !status.is_success() {
            return Err(authed_error(status, &body));
        }
        Ok(())
    }

    async fn submit_check_in(&self, access_token: &str, checkin: &CheckIn) -> Result<(), ApiError> {
        let endpoint = self.endpoint(&["api", "checkin"])?;
        let request = CheckInRequest {
            kind: checkin.kind,
            task_id: checkin.task_id,
            duration: checkin.duration_minutes,
        };
        let response = self
            .client
            .post(endpoint)
            .bearer_auth(access_token)
            .json(&request)
            .send()
            .await
            .map_err(|error| transport_error("network error while submitting check-in", error))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| transport_error("failed reading check-in response", error))?;
        if !status.is_success() {
            return Err(authed_error(status, &body));
        }
        Ok(())
    }

    async fn fetch_stats(&self, access_token: &str) -> Result<StatsSnapshot, ApiError> {
        let endpoint = self.endpoint(&["api", "stats"])?;
        let response = self
            .client
            .get(endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|error| transport_error("network error while fetching stats", error))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| transport_error("failed reading stats response", error))?;
        if !status.is_success() {
            return Err(authed_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|error| ApiError::Rejected {
            status: status.as_u16(),
            reason: format!("invalid stats payload: {error}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_segments_onto_the_base() {
        let client = ReqwestHabitApiClient::new("http://127.0.0.1:5000").expect("valid base url");
        let url = client.endpoint(&["api", "tasks", "42"]).expect("endpoint");
        assert_eq!(url.as_str(), "http://127.0.0.1:5000/api/tasks/42");
    }

    #[test]
    fn endpoint_handles_trailing_slash_in_base() {
        let client = ReqwestHabitApiClient::new("https://habits.example.com/").expect("valid base url");
        let url = client.endpoint(&["auth", "login"]).expect("endpoint");
        assert_eq!(url.as_str(), "https://habits.example.com/auth/login");
    }

    #[test]
    fn parse_created_at_accepts_rfc3339_and_naive_isoformat() {
        let with_offset = parse_created_at("2026-03-02T08:00:00+00:00").expect("rfc3339");
        let naive = parse_created_at("2026-03-02T08:00:00").expect("naive isoformat");
        let fractional = parse_created_at("2026-03-02T08:00:00.123456").expect("fractional");
        assert_eq!(with_offset, naive);
        assert_eq!(fractional.timestamp(), naive.timestamp());
        assert!(parse_created_at("yesterday").is_err());
    }

    #[test]
    fn rejection_error_prefers_the_server_message() {
        let error = rejection_error(StatusCode::BAD_REQUEST, r#"{"msg": "Username already exists"}"#);
        match error {
            ApiError::Rejected { status, reason } => {
                assert_eq!(status, 400);
                assert_eq!(reason, "Username already exists");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn rejection_error_falls_back_to_the_raw_body() {
        let error = rejection_error(StatusCode::INTERNAL_SERVER_ERROR, "boom");
        match error {
            ApiError::Rejected { status, reason } => {
                assert_eq!(status, 500);
                assert_eq!(reason, "boom");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn authed_error_maps_unauthorized_to_auth_expired() {
        assert!(matches!(
            authed_error(StatusCode::UNAUTHORIZED, ""),
            ApiError::AuthExpired
        ));
        assert!(matches!(
            authed_error(StatusCode::UNPROCESSABLE_ENTITY, r#"{"msg": "Invalid token"}"#),
            ApiError::Rejected { status: 422, .. }
        ));
    }

    #[test]
    fn task_payload_maps_onto_the_domain_task() {
        let payload: TaskPayload = serde_json::from_str(
            r#"{
                "id": 3,
                "title": "Read",
                "description": "20 pages",
                "target_type": "time",
                "target_value": 20,
                "created_at": "2026-03-02T08:00:00",
                "progress": 5,
                "is_completed": false
            }"#,
        )
        .expect("task payload");
        let task = task_from_payload(payload).expect("domain task");
        assert_eq!(task.id, 3);
        assert_eq!(task.target_type, TargetType::Time);
        assert_eq!(task.target_value, 20);
        assert_eq!(task.progress, 5);
        assert!(!task.is_completed);
    }

    #[test]
    fn check_in_request_uses_the_wire_field_names() {
        let request = CheckInRequest {
            kind: CheckInKind::Pomodoro,
            task_id: Some(3),
            duration: Some(25),
        };
        let encoded = serde_json::to_value(&request).expect("serialize");
        assert_eq!(
            encoded,
            serde_json::json!({"type": "pomodoro", "task_id": 3, "duration": 25})
        );

        let manual = CheckInRequest {
            kind: CheckInKind::TaskCheckin,
            task_id: Some(9),
            duration: None,
        };
        let encoded = serde_json::to_value(&manual).expect("serialize");
        assert_eq!(encoded, serde_json::json!({"type": "task_checkin", "task_id": 9}));
    }
}
