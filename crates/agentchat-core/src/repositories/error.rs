use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Stream error: {0}")]
    Stream(String),
}

impl ServiceError {
    /// Statuses meaning "this server has no such capability"
    pub fn is_not_available(&self) -> bool {
        matches!(self, ServiceError::Http { status: 404 | 501, .. })
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
