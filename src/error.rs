//! Error types for cluster-notify.

use std::fmt;

/// Result type alias for cluster-notify operations.
pub type Result<T> = std::result::Result<T, NotifyError>;

/// Errors that can occur while loading settings, binding a cluster or
/// moving notifications across the transport.
///
/// None of these ever reach the code that mutated a resource: the dispatcher
/// turns transport failures into a local-only delivery and a log line.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The cluster is not initialized, disabled, or the topic cannot be reached.
    #[error("Cluster transport unavailable: {0}")]
    TransportUnavailable(String),

    /// The topic accepted the message but failed to hand it off.
    #[error("Failed to publish notification: {0}")]
    PublishFailed(String),

    /// A notification could not be encoded or decoded.
    #[error("Malformed notification payload: {0}")]
    Codec(String),

    /// Failed to load settings from a source.
    #[error("Failed to load settings: {0}")]
    LoadError(String),

    /// Failed to deserialize settings.
    #[error("Failed to deserialize settings: {0}")]
    DeserializationError(String),

    /// Settings validation failed.
    #[error("Settings validation failed: {0}")]
    ValidationError(String),

    /// Resource watching failed to initialize.
    #[error("Resource watch error: {0}")]
    WatchError(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error for other cases.
    #[error("Notification error: {0}")]
    Other(String),
}

impl From<serde_json::Error> for NotifyError {
    fn from(err: serde_json::Error) -> Self {
        NotifyError::Codec(err.to_string())
    }
}

/// Failure reported by a resource listener.
///
/// Returned from [`ResourceListener::changed`](crate::core::ResourceListener::changed);
/// the dispatcher logs it and keeps delivering to the remaining listeners.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ListenerError(pub String);

impl ListenerError {
    /// Create a listener error with a message.
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Validation error for settings validation.
#[derive(Debug)]
pub enum ValidationError {
    /// Custom validation error with a message.
    Custom(String),

    /// A specific field has an invalid value.
    InvalidField {
        /// The field name/path
        field: String,
        /// The reason why it's invalid
        reason: String,
    },

    /// Multiple validation errors occurred.
    Multiple(Vec<ValidationError>),
}

impl ValidationError {
    /// Create a custom validation error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Create an invalid field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(msg) => write!(f, "{}", msg),
            Self::InvalidField { field, reason } => {
                write!(f, "Field '{}' is invalid: {}", field, reason)
            }
            Self::Multiple(errors) => {
                writeln!(f, "Multiple validation errors:")?;
                for (i, err) in errors.iter().enumerate() {
                    writeln!(f, "  {}. {}", i + 1, err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for NotifyError {
    fn from(err: ValidationError) -> Self {
        NotifyError::ValidationError(err.to_string())
    }
}
