use thiserror::Error;

pub type Result<T> = std::result::Result<T, CrmError>;

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("CRM is not configured (domain or access token missing)")]
    NotConfigured,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for CrmError {
    fn from(err: reqwest::Error) -> Self {
        CrmError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for CrmError {
    fn from(err: serde_json::Error) -> Self {
        CrmError::Parse(err.to_string())
    }
}
