use thiserror::Error;

/// Reasons a single packed slot cannot be turned back into an entry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("slot key `{0}` is not a position")]
    SlotKey(String),

    #[error("slot has {0} fields, expected 3")]
    FieldCount(usize),

    #[error("invalid base64 in {field}: {reason}")]
    Base64 { field: &'static str, reason: String },

    #[error("{0} is not valid UTF-8")]
    Utf8(&'static str),

    #[error("invalid timestamp `{value}`: {reason}")]
    Timestamp { value: String, reason: String },
}

/// Failures of a backing preference store.
#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("preference store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("preference document is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("preference store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum FilteringError {
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("preferences error: {0}")]
    Prefs(#[from] PrefsError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, FilteringError>;
