/// Errors that can occur while running a DOG session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] doglink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] doglink_frame::FrameError),

    /// Configuration is out of range.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error outside the link itself (config files, key input).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// An encryption key of the wrong size.
    #[error("encryption key must be {expected} bytes, got {actual}")]
    KeyLength { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, SessionError>;
