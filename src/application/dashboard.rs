use crate::application::commands::{RuntimeState, lock_runtime};
use crate::infrastructure::error::ApiError;
use crate::infrastructure::habit_api_client::HabitApiClient;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// The combined tasks+stats read applied to the runtime cache. Both requests
/// run concurrently and the result lands atomically; a generation counter
/// makes a newer refresh supersede an older in-flight one instead of racing
/// it.
pub struct DashboardRefresher<C>
where
    C: HabitApiClient,
{
    api_client: Arc<C>,
    runtime: Arc<Mutex<RuntimeState>>,
    refresh_generation: AtomicU64,
}

impl<C> DashboardRefresher<C>
where
    C: HabitApiClient,
{
    pub fn new(api_client: Arc<C>, runtime: Arc<Mutex<RuntimeState>>) -> Self {
        Self {
            api_client,
            runtime,
            refresh_generation: AtomicU64::new(0),
        }
    }

    pub async fn refresh(&self, access_token: &str) -> Result<(), ApiError> {
        let generation = self.refresh_generation.fetch_add(1, Ordering::SeqCst) + 1;

        let (tasks, stats) = tokio::join!(
            self.api_client.list_tasks(access_token),
            self.api_client.fetch_stats(access_token),
        );
        let tasks = tasks?;
        let stats = stats?;

        let mut runtime = lock_runtime(&self.runtime)?;
        if generation > runtime.applied_refresh_generation {
            runtime.tasks = tasks;
            runtime.stats = stats;
            runtime.applied_refresh_generation = generation;
        }
        Ok(())
    }
}
