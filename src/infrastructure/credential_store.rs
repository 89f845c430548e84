use crate::domain::models::AuthSession;
use crate::infrastructure::error::ApiError;
use std::sync::Mutex;

/// Persists the authenticated session across launches so the dashboard can
/// bootstrap without a fresh login.
pub trait CredentialStore: Send + Sync {
    fn save_session(&self, session: &AuthSession) -> Result<(), ApiError>;
    fn load_session(&self) -> Result<Option<AuthSession>, ApiError>;
    fn delete_session(&self) -> Result<(), ApiError>;
}

#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service_name: String,
    account_name: String,
}

impl KeyringCredentialStore {
    pub fn new(service_name: impl Into<String>, account_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            account_name: account_name.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, ApiError> {
        keyring::Entry::new(&self.service_name, &self.account_name)
            .map_err(|error| ApiError::Credential(error.to_string()))
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new("habitdash.session", "default")
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn save_session(&self, session: &AuthSession) -> Result<(), ApiError> {
        let payload = serde_json::to_string(session)
            .map_err(|error| ApiError::Credential(error.to_string()))?;
        self.entry()?
            .set_password(&payload)
            .map_err(|error| ApiError::Credential(error.to_string()))
    }

    fn load_session(&self) -> Result<Option<AuthSession>, ApiError> {
        let payload = match self.entry()?.get_password() {
            Ok(value) => value,
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(error) => return Err(ApiError::Credential(error.to_string())),
        };

        let session = serde_json::from_str::<AuthSession>(&payload)
            .map_err(|error| ApiError::Credential(error.to_string()))?;
        Ok(Some(session))
    }

    fn delete_session(&self) -> Result<(), ApiError> {
        match self.entry()?.delete_credential() {
            Ok(_) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(ApiError::Credential(error.to_string())),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    session: Mutex<Option<AuthSession>>,
}

impl CredentialStore for InMemoryCredentialStore {
    fn save_session(&self, session: &AuthSession) -> Result<(), ApiError> {
        let mut guard = self
            .session
            .lock()
            .map_err(|error| ApiError::Credential(format!("in-memory lock poisoned: {error}")))?;
        *guard = Some(session.clone());
        Ok(())
    }

    fn load_session(&self) -> Result<Option<AuthSession>, ApiError> {
        let guard = self
            .session
            .lock()
            .map_err(|error| ApiError::Credential(format!("in-memory lock poisoned: {error}")))?;
        Ok(guard.clone())
    }

    fn delete_session(&self) -> Result<(), ApiError> {
        let mut guard = self
            .session
            .lock()
            .map_err(|error| ApiError::Credential(format!("in-memory lock poisoned: {error}")))?;
        *guard = None;
        Ok(())
    }
}
