use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never completed: DNS, connect, or transfer failure.
    #[error("network error: {0}")]
    Transport(String),
    /// The server declined the request for a reason other than expired
    /// authentication.
    #[error("request rejected (http {status}): {reason}")]
    Rejected { status: u16, reason: String },
    /// The bearer token is missing or no longer valid; the caller must tear
    /// the authenticated session down.
    #[error("authentication expired")]
    AuthExpired,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Credential store error: {0}")]
    Credential(String),
}
