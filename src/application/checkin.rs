use crate::domain::models::CheckIn;
use crate::infrastructure::error::ApiError;
use crate::infrastructure::habit_api_client::HabitApiClient;
use std::sync::Arc;

/// Translates a completed work phase or a manual task completion into exactly
/// one outbound check-in request. Delivery is at-most-once: a failure is
/// returned to the caller and never retried here.
pub struct CheckInRecorder<C>
where
    C: HabitApiClient,
{
    api_client: Arc<C>,
}

impl<C> CheckInRecorder<C>
where
    C: HabitApiClient,
{
    pub fn new(api_client: Arc<C>) -> Self {
        Self { api_client }
    }

    pub async fn record(&self, access_token: &str, checkin: &CheckIn) -> Result<(), ApiError> {
        checkin.validate().map_err(ApiError::InvalidConfig)?;
        self.api_client.submit_check_in(access_token, checkin).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{FakeFailure, FakeHabitApiClient};
    use crate::domain::models::CheckInKind;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn record_issues_exactly_one_request() {
        let client = Arc::new(FakeHabitApiClient::default());
        let recorder = CheckInRecorder::new(Arc::clone(&client));

        recorder
            .record("jwt", &CheckIn::pomodoro(25, Some(3)))
            .await
            .expect("record check-in");

        assert_eq!(client.check_in_calls.load(Ordering::SeqCst), 1);
        let submitted = client.submitted_check_ins.lock().expect("submitted check-ins");
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].0, "jwt");
        assert_eq!(submitted[0].1.kind, CheckInKind::Pomodoro);
        assert_eq!(submitted[0].1.duration_minutes, Some(25));
        assert_eq!(submitted[0].1.task_id, Some(3));
    }

    #[tokio::test]
    async fn invalid_checkin_never_reaches_the_network() {
        let client = Arc::new(FakeHabitApiClient::default());
        let recorder = CheckInRecorder::new(Arc::clone(&client));

        let mut checkin = CheckIn::task_checkin(3);
        checkin.task_id = None;
        let result = recorder.record("jwt", &checkin).await;

        assert!(matches!(result, Err(ApiError::InvalidConfig(_))));
        assert_eq!(client.check_in_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rejection_is_returned_without_retry() {
        let client = Arc::new(FakeHabitApiClient::default());
        client.set_check_in_failure(Some(FakeFailure::Transport));
        let recorder = CheckInRecorder::new(Arc::clone(&client));

        let result = recorder.record("jwt", &CheckIn::task_checkin(3)).await;
        assert!(matches!(result, Err(ApiError::Transport(_))));
        assert_eq!(client.check_in_calls.load(Ordering::SeqCst), 1);
    }
}
