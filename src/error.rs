use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildLightError {
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Malformed response body: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Indicator hardware unavailable: {0}")]
    HardwareUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Indicator already initialized")]
    AlreadyInitialized,

    #[error("Unrecoverable monitoring fault: {0}")]
    Fault(String),
}

pub type Result<T> = std::result::Result<T, BuildLightError>;
