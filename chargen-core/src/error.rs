//! Error types for the creation driver.

use thiserror::Error;

/// Errors surfaced by the creation driver and its configuration.
#[derive(Debug, Error)]
pub enum CreationError {
    /// No credential for the LLM API.
    #[error("No API key configured; set ANTHROPIC_API_KEY in the environment or a .env file")]
    NoApiKey,

    /// The rulebook or driver configuration is invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Transport or API failure, passed through unmodified.
    #[error("Claude API error: {0}")]
    Api(claude::Error),

    /// The assistant kept calling tools without finishing its turn.
    #[error("Assistant did not finish its turn after {rounds} tool rounds")]
    ToolLoop { rounds: usize },

    /// Character creation already reached its final topic.
    #[error("Character creation is already finished")]
    Finished,
}

impl From<claude::Error> for CreationError {
    fn from(err: claude::Error) -> Self {
        match err {
            claude::Error::NoApiKey => CreationError::NoApiKey,
            other => CreationError::Api(other),
        }
    }
}
