use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to attach to process: {0}")]
    Attach(String),

    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Offset chain {name} ({chain}) resolved to an invalid address")]
    InvalidAddress { name: String, chain: String },

    #[error("Failed to read process memory at address {address:#x}: {message}")]
    MemoryReadFailed { address: u64, message: String },

    #[error("Failed to write process memory at address {address:#x}: {message}")]
    MemoryWriteFailed { address: u64, message: String },

    #[error("Cannot access disposed memory: {name}{}", reason_suffix(.reason))]
    Disposed { name: String, reason: Option<String> },

    #[error("Disposing of memory {name} due to error: {source}")]
    MarshalerFaulted {
        name: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Listener of {name} panicked: {message}")]
    ListenerPanicked { name: String, message: String },

    #[error("Game process has terminated")]
    ProcessExited,

    #[error("Marshaler service is not running")]
    ServiceStopped,

    #[error("No marshaler codec registered for type: {0}")]
    NoCodec(&'static str),

    #[error("Marshaler codec already registered for type: {0}")]
    CodecAlreadyRegistered(&'static str),

    #[error("Invalid offset: {0}")]
    InvalidOffset(String),

    #[error("Can't find a signature of {pattern}")]
    SignatureNotFound { pattern: String },

    #[error("Process module is invalid: {0}")]
    InvalidModule(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is a "file not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason
        .as_deref()
        .map(|r| format!(" ({r})"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_not_found() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::Io(io_err);
        assert!(err.is_not_found());

        let other_io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err2 = Error::Io(other_io_err);
        assert!(!err2.is_not_found());
    }

    #[test]
    fn test_disposed_message_includes_reason() {
        let err = Error::Disposed {
            name: "Position".to_string(),
            reason: Some("read failed".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Cannot access disposed memory: Position (read failed)"
        );

        let err = Error::Disposed {
            name: "Position".to_string(),
            reason: None,
        };
        assert_eq!(err.to_string(), "Cannot access disposed memory: Position");
    }
}
