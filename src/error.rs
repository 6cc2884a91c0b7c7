use thiserror::Error;

#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Token id {0} is not in the vocabulary")]
    OutOfRange(u32),

    #[error("Input shape error: {0}")]
    InputShape(String),
}

pub type Result<T> = std::result::Result<T, TokenizerError>;
