use crate::domain::models::AuthSession;
use crate::infrastructure::credential_store::CredentialStore;
use crate::infrastructure::error::ApiError;
use crate::infrastructure::habit_api_client::HabitApiClient;
use std::sync::Arc;

/// Owns the authenticated-session lifecycle: credential exchange, persisted
/// bootstrap, and teardown. The focus core never touches login state itself;
/// everything auth goes through here.
pub struct SessionManager<S, C>
where
    S: CredentialStore,
    C: HabitApiClient,
{
    credential_store: Arc<S>,
    api_client: Arc<C>,
}

impl<S, C> SessionManager<S, C>
where
    S: CredentialStore,
    C: HabitApiClient,
{
    pub fn new(credential_store: Arc<S>, api_client: Arc<C>) -> Self {
        Self {
            credential_store,
            api_client,
        }
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<(), ApiError> {
        let (username, password) = normalized_credentials(username, password)?;
        self.api_client.register(&username, &password).await
    }

    /// Exchanges credentials for a bearer token and persists the resulting
    /// session for the next launch.
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthSession, ApiError> {
        let (username, password) = normalized_credentials(username, password)?;
        let access_token = self.api_client.login(&username, &password).await?;
        let session = AuthSession {
            username,
            access_token,
        };
        self.credential_store.save_session(&session)?;
        Ok(session)
    }

    /// Loads the persisted session, if any. A corrupt entry is discarded
    /// rather than surfaced: the user just logs in again.
    pub fn restore(&self) -> Result<Option<AuthSession>, ApiError> {
        let Some(session) = self.credential_store.load_session()? else {
            return Ok(None);
        };
        if session.validate().is_err() {
            self.credential_store.delete_session()?;
            return Ok(None);
        }
        Ok(Some(session))
    }

    pub fn logout(&self) -> Result<(), ApiError> {
        self.credential_store.delete_session()
    }
}

fn normalized_credentials(username: &str, password: &str) -> Result<(String, String), ApiError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(ApiError::InvalidConfig("username must not be empty".to_string()));
    }
    if password.is_empty() {
        return Err(ApiError::InvalidConfig("password must not be empty".to_string()));
    }
    Ok((username.to_string(), password.to_string()))
}
