use thiserror::Error;

/// Infrastructure failures of the gating pipeline.
///
/// Policy violations are not errors: guards report those as
/// `ValidationOutcome::Rejected` values and the caller decides what to do.
#[derive(Error, Debug)]
pub enum WardError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("SQL syntax error: {0}")]
    Syntax(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Log store error: {0}")]
    LogStore(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WardError>;
