/// Reasons a trigger payload is turned away before it reaches an animator.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] json::Error),
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("unknown message type {0:?}")]
    UnknownType(String),
    #[error("missing required key {0:?}")]
    MissingField(&'static str),
    #[error("{0:?} must be [r, g, b] or {{\"r\", \"g\", \"b\"}}")]
    WrongShape(&'static str),
    #[error("{field:?} has invalid channel value {value}")]
    InvalidChannel { field: &'static str, value: String },
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("cannot encode frame: {0}")]
    Encode(String),
    #[error("cannot send frame: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame of {len} bytes does not fit {capacity} channels")]
    FrameTooLarge { len: usize, capacity: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {reason}")]
    File { path: String, reason: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn invalid<T: Into<String>>(msg: T) -> Self {
        Self::Invalid(msg.into())
    }
}
