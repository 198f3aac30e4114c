use thiserror::Error;

/// Runtime errors.
///
/// None of these touch the session log; they only decide what gets spoken.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    /// No API key is set, so the skill declines to answer.
    #[error("chat backend not configured: set an api_key")]
    NotConfigured,

    #[error("network error: {0}")]
    Network(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, Error>;
