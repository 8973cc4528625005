//! Error types for bkd-core
//!
//! Every engine operation returns [`Error`]. Validation failures are raised
//! before any store call; store failures are wrapped in [`Error::Io`] together
//! with the operation and path that triggered them.

use thiserror::Error;

/// Result type alias for bkd-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by an [`ObjectStore`](crate::ObjectStore) implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The container or object does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The container already exists
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Credentials rejected or access denied
    #[error("access denied: {0}")]
    Auth(String),

    /// Connection, timeout or other transport failure
    #[error("transport failure: {0}")]
    Transport(String),

    /// Any other error answered by the service
    #[error("service error: {0}")]
    Service(String),
}

impl StoreError {
    /// Whether this failure means the addressed resource is absent
    pub const fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Error types for bkd-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or empty path or path segment
    #[error("Invalid path: {0}")]
    PathInvalid(String),

    /// Container or key segment fails the naming pattern
    #[error("Invalid name: {0}")]
    NameInvalid(String),

    /// Path does not resolve to an existing container or leaf
    #[error("Not found: {0}")]
    NotFound(String),

    /// Target already exists and overwrite was not requested
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Container still holds leaves
    #[error("Container is not empty: {0}")]
    NotEmpty(String),

    /// Operation cannot be mapped onto the store
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Path has no parent segment
    #[error("Path has no parent: {0}")]
    NoParent(String),

    /// Path does not lie under the given base
    #[error("Path '{path}' is not contained in '{base}'")]
    NotContained { path: String, base: String },

    /// Resource still in use (open content sessions)
    #[error("Busy: {0}")]
    Busy(String),

    /// Store failure with operation and path context
    #[error("{operation} failed for '{path}': {source}")]
    Io {
        operation: &'static str,
        path: String,
        #[source]
        source: StoreError,
    },

    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local filesystem error
    #[error("IO error: {0}")]
    LocalIo(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Wrap a store failure with the operation and path that caused it
    pub fn io(operation: &'static str, path: impl Into<String>, source: StoreError) -> Self {
        Error::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Map a store failure, turning a store-side "not found" into [`Error::NotFound`]
    pub fn from_store(operation: &'static str, path: impl Into<String>, source: StoreError) -> Self {
        let path = path.into();
        if source.is_not_found() {
            Error::NotFound(path)
        } else {
            Error::io(operation, path, source)
        }
    }

    /// Get the appropriate exit code for this error
    pub const fn exit_code(&self) -> i32 {
        match self {
            Error::PathInvalid(_)
            | Error::NameInvalid(_)
            | Error::NoParent(_)
            | Error::NotContained { .. }
            | Error::Config(_)
            | Error::InvalidUrl(_) => 2, // UsageError
            Error::Io {
                source: StoreError::Auth(_),
                ..
            } => 4, // AuthError
            Error::Io { .. } => 3,                  // NetworkError
            Error::NotFound(_) => 5,                // NotFound
            Error::AlreadyExists(_) | Error::NotEmpty(_) | Error::Busy(_) => 6, // Conflict
            Error::Unsupported(_) => 7,             // UnsupportedFeature
            _ => 1,                                 // GeneralError
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(Error::PathInvalid("test".into()).exit_code(), 2);
        assert_eq!(Error::NameInvalid("test".into()).exit_code(), 2);
        assert_eq!(Error::Config("test".into()).exit_code(), 2);
        assert_eq!(
            Error::io("list", "b", StoreError::Transport("reset".into())).exit_code(),
            3
        );
        assert_eq!(
            Error::io("list", "b", StoreError::Auth("denied".into())).exit_code(),
            4
        );
        assert_eq!(Error::NotFound("test".into()).exit_code(), 5);
        assert_eq!(Error::AlreadyExists("test".into()).exit_code(), 6);
        assert_eq!(Error::NotEmpty("test".into()).exit_code(), 6);
        assert_eq!(Error::Unsupported("test".into()).exit_code(), 7);
    }

    #[test]
    fn test_from_store_maps_not_found() {
        let err = Error::from_store("head", "b/k", StoreError::NotFound("k".into()));
        assert!(matches!(err, Error::NotFound(p) if p == "b/k"));

        let err = Error::from_store("head", "b/k", StoreError::Service("500".into()));
        assert!(matches!(err, Error::Io { operation: "head", .. }));
    }

    #[test]
    fn test_error_display() {
        let err = Error::io("delete", "charts/a.tgz", StoreError::Transport("timeout".into()));
        assert_eq!(
            err.to_string(),
            "delete failed for 'charts/a.tgz': transport failure: timeout"
        );

        let err = Error::PathInvalid("a//b".into());
        assert_eq!(err.to_string(), "Invalid path: a//b");
    }
}
