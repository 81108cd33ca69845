use thiserror::Error;

pub type Result<T> = std::result::Result<T, CompanionError>;

#[derive(Debug, Error)]
pub enum CompanionError {
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Assistant API error: {0}")]
    AssistantApi(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("A run is still in progress for this session")]
    RunInProgress,

    #[error("Internal error: {0}")]
    Internal(String),
}
