use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Unknown data version '{0}'; this program can only load v1 data")]
    UnknownVersion(String),
    #[error("Malformed data: {0}")]
    MalformedData(String),
    #[error("Cannot load data from file '{0}'")]
    UnsupportedFile(String),
    #[error("{0} has no time point")]
    MissingTimePoint(String),
    #[error("Invalid link: {0}")]
    InvalidLink(String),
    #[error("Link rejected: {0}")]
    LinkRejected(String),
    #[error("Invalid connection: {0}")]
    InvalidConnection(String),
    #[error("Invalid family: {0}")]
    InvalidFamily(String),
    #[error("Family belongs to time point {found}, not to time point {expected}")]
    TimePointMismatch { expected: i32, found: i32 },
    #[error("Invalid image resolution: {0}")]
    InvalidResolution(String),
}

pub type Result<T> = std::result::Result<T, TrackerError>;
