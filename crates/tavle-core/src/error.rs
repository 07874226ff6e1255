//! Error types for tavle.

use thiserror::Error;

/// Result type alias using tavle's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for tavle operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Event not found
    #[error("Event not found: {0}")]
    EventNotFound(uuid::Uuid),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A text field exceeded its maximum length
    #[error("Field too long: {field} (max {max} characters)")]
    FieldTooLong { field: &'static str, max: usize },

    /// Too many submission attempts within the rate window
    #[error("Too many submissions, try again later")]
    RateLimited,

    /// Anti-abuse verification rejected the submission
    #[error("Moderation check failed: {0}")]
    Moderation(String),

    /// Authentication failed (missing or invalid credential)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Forbidden (authenticated but not authorized)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Configuration error (server-side misconfiguration)
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("mail_recipients".to_string());
        assert_eq!(err.to_string(), "Not found: mail_recipients");
    }

    #[test]
    fn test_error_display_event_not_found() {
        let id = Uuid::nil();
        let err = Error::EventNotFound(id);
        assert_eq!(err.to_string(), format!("Event not found: {}", id));
    }

    #[test]
    fn test_error_display_field_too_long() {
        let err = Error::FieldTooLong {
            field: "title",
            max: 140,
        };
        assert_eq!(
            err.to_string(),
            "Field too long: title (max 140 characters)"
        );
    }

    #[test]
    fn test_error_display_rate_limited() {
        assert_eq!(
            Error::RateLimited.to_string(),
            "Too many submissions, try again later"
        );
    }

    #[test]
    fn test_error_display_moderation() {
        let err = Error::Moderation("score too low".to_string());
        assert_eq!(err.to_string(), "Moderation check failed: score too low");
    }

    #[test]
    fn test_error_display_unauthorized() {
        let err = Error::Unauthorized("invalid token".to_string());
        assert_eq!(err.to_string(), "Unauthorized: invalid token");
    }

    #[test]
    fn test_error_display_forbidden() {
        let err = Error::Forbidden("not in allow-list".to_string());
        assert_eq!(err.to_string(), "Forbidden: not in allow-list");
    }

    #[test]
    fn test_error_display_config() {
        let err = Error::Config("missing moderation secret".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: missing moderation secret"
        );
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number");
        assert!(json_err.is_err());

        let err: Error = json_err.unwrap_err().into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        match err {
            Error::Io(_) => {}
            _ => panic!("Expected Io error"),
        }
    }
}
