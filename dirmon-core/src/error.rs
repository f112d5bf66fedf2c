//! `src/error.rs`
//! ============================================================================
//! # `CoreError`: unified error type for the directory engine
//!
//! • Cheap to clone (errors fan out to every pending callback)
//! • `CompactString` payloads keep the common variants on the stack
//! • Classification helpers drive the backend retry loop
//! • `#[non_exhaustive]` for forward-compatible extension

use std::{
    io::{self, ErrorKind},
    sync::Arc,
};

use compact_str::CompactString;
use smallvec::{SmallVec, smallvec};
use thiserror::Error;
use tracing::{Level, event};

/// Convenient alias carrying our unified error type
pub type CoreResult<T> = Result<T, CoreError>;

/// Primary error enumeration (grouped by concern)
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    // ────────────────────────────────────────────────────────────
    // Location failures (permanent)
    // ────────────────────────────────────────────────────────────
    #[error("Location not found: {0}")]
    NotFound(CompactString),

    #[error("Permission denied: {0}")]
    PermissionDenied(CompactString),

    #[error("Not a directory: {0}")]
    NotADirectory(CompactString),

    // ────────────────────────────────────────────────────────────
    // Raw I/O
    // ────────────────────────────────────────────────────────────
    #[error("I/O error on {location}: {kind:?}")]
    Io {
        location: CompactString,
        kind: ErrorKind,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("Gave up on {location} after {attempts} attempts: {last}")]
    RetriesExhausted {
        location: CompactString,
        attempts: u32,
        last: Box<CoreError>,
    },

    // ────────────────────────────────────────────────────────────
    // Addressing
    // ────────────────────────────────────────────────────────────
    #[error("Invalid URI '{uri}': {reason}")]
    InvalidUri {
        uri: CompactString,
        reason: CompactString,
    },

    #[error("Unsupported URI scheme: {0}")]
    UnsupportedScheme(CompactString),

    // ────────────────────────────────────────────────────────────
    // Protocol misuse
    // ────────────────────────────────────────────────────────────
    #[error("Invalid state: {message}")]
    InvalidState { message: CompactString },

    #[error("Operation was cancelled")]
    Cancelled,

    // ────────────────────────────────────────────────────────────
    // Watching
    // ────────────────────────────────────────────────────────────
    #[error("Watch unavailable for {location}: {reason}")]
    Watch {
        location: CompactString,
        reason: CompactString,
    },

    // ────────────────────────────────────────────────────────────
    // Configuration
    // ────────────────────────────────────────────────────────────
    #[error("Config error: {0}")]
    Config(CompactString),

    /// Any other error, with description.
    #[error("Unexpected error: {0}")]
    Other(CompactString),
}

// ────────────────────────────────────────────────────────────────────────────
// Fast classification helpers
// ────────────────────────────────────────────────────────────────────────────
impl CoreError {
    /// Busy / interrupted style failures that a backend may retry.
    #[inline]
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Io {
                kind: ErrorKind::Interrupted
                    | ErrorKind::WouldBlock
                    | ErrorKind::TimedOut
                    | ErrorKind::ResourceBusy
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted,
                ..
            }
        )
    }

    /// Failures that are reported once and never retried.
    #[inline]
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::PermissionDenied(_)
                | Self::NotADirectory(_)
                | Self::UnsupportedScheme(_)
                | Self::InvalidUri { .. }
                | Self::RetriesExhausted { .. }
        )
    }

    /// Cancellation is not an error from the client's point of view.
    #[inline]
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    // ────────────────────────────────────────────────────────────
    // Attribute helpers – used for JSON log grouping
    // ────────────────────────────────────────────────────────────
    #[inline]
    #[must_use]
    pub const fn operation_type(&self) -> &'static str {
        match self {
            Self::NotFound(_) | Self::PermissionDenied(_) | Self::NotADirectory(_) => {
                "location_access"
            }

            Self::Io { .. } | Self::RetriesExhausted { .. } => "file_system",

            Self::InvalidUri { .. } | Self::UnsupportedScheme(_) => "addressing",

            Self::InvalidState { .. } | Self::Cancelled => "protocol",

            Self::Watch { .. } => "watch",

            Self::Config(_) => "configuration",

            Self::Other(_) => "unknown_error",
        }
    }

    #[inline]
    #[must_use]
    const fn error_marker(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "ERROR_NOT_FOUND",
            Self::PermissionDenied(_) => "ERROR_PERMISSION_DENIED",
            Self::NotADirectory(_) => "ERROR_NOT_A_DIRECTORY",
            Self::Io { .. } => "ERROR_IO",
            Self::RetriesExhausted { .. } => "ERROR_RETRIES_EXHAUSTED",
            Self::InvalidUri { .. } => "ERROR_INVALID_URI",
            Self::UnsupportedScheme(_) => "ERROR_UNSUPPORTED_SCHEME",
            Self::InvalidState { .. } => "ERROR_INVALID_STATE",
            Self::Cancelled => "ERROR_CANCELLED",
            Self::Watch { .. } => "ERROR_WATCH",
            Self::Config(_) => "ERROR_CONFIG",
            Self::Other(_) => "ERROR_UNKNOWN",
        }
    }

    // Structured-field extraction (SmallVec avoids heap ≤4 items)
    #[must_use]
    pub fn extract_trace_fields(&self) -> SmallVec<[(&'static str, CompactString); 4]> {
        match self {
            Self::Io { location, kind, .. } => smallvec![
                ("location", location.clone()),
                ("error_kind", CompactString::from(format!("{kind:?}"))),
            ],

            Self::RetriesExhausted {
                location, attempts, ..
            } => smallvec![
                ("location", location.clone()),
                ("attempts", CompactString::from(attempts.to_string())),
            ],

            Self::NotFound(location)
            | Self::PermissionDenied(location)
            | Self::NotADirectory(location) => smallvec![("location", location.clone())],

            Self::InvalidUri { uri, reason } => {
                smallvec![("uri", uri.clone()), ("reason", reason.clone())]
            }

            _ => smallvec![],
        }
    }

    /// Emit a single structured `tracing` event and hand the error back.
    #[must_use]
    pub fn trace(self) -> Self {
        let extra = self.extract_trace_fields();

        event!(
            Level::WARN,
            marker = self.error_marker(),
            operation_type = self.operation_type(),
            error = %self,
            transient = self.is_transient(),
            permanent = self.is_permanent(),
            extra = ?extra,
        );

        self
    }

    // ────────────────────────────────────────────────────────────
    // Smart constructors
    // ────────────────────────────────────────────────────────────
    #[inline]
    #[must_use]
    pub fn invalid_state(message: &str) -> Self {
        Self::InvalidState {
            message: CompactString::new(message),
        }
    }

    #[inline]
    #[must_use]
    pub fn invalid_uri(uri: &str, reason: &str) -> Self {
        Self::InvalidUri {
            uri: CompactString::new(uri),
            reason: CompactString::new(reason),
        }
    }

    #[inline]
    #[must_use]
    pub fn watch(location: &str, reason: &str) -> Self {
        Self::Watch {
            location: CompactString::new(location),
            reason: CompactString::new(reason),
        }
    }

    /// Map an `io::Error` raised while touching `location` onto a variant.
    #[must_use]
    pub fn from_io(location: &str, err: io::Error) -> Self {
        let location = CompactString::new(location);

        match err.kind() {
            ErrorKind::NotFound => Self::NotFound(location),
            ErrorKind::PermissionDenied => Self::PermissionDenied(location),
            ErrorKind::NotADirectory => Self::NotADirectory(location),
            kind => Self::Io {
                location,
                kind,
                source: Arc::new(err),
            },
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Mapping from std::io::Error without location context
// ────────────────────────────────────────────────────────────────────────────
impl From<io::Error> for CoreError {
    fn from(err: io::Error) -> Self {
        Self::from_io("<unknown>", err)
    }
}

impl From<toml::de::Error> for CoreError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(CompactString::from(err.to_string()))
    }
}

impl From<url::ParseError> for CoreError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUri {
            uri: CompactString::const_new("<unparsed>"),
            reason: CompactString::from(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_kinds_map_to_location_variants() {
        let err = CoreError::from_io("/tmp/x", io::Error::from(ErrorKind::NotFound));
        assert!(matches!(err, CoreError::NotFound(_)));
        assert!(err.is_permanent());
        assert!(!err.is_transient());

        let err = CoreError::from_io("/tmp/x", io::Error::from(ErrorKind::PermissionDenied));
        assert!(matches!(err, CoreError::PermissionDenied(_)));
        assert!(err.is_permanent());
    }

    #[test]
    fn interrupted_is_transient() {
        let err = CoreError::from_io("/tmp/x", io::Error::from(ErrorKind::Interrupted));
        assert!(err.is_transient());
        assert!(!err.is_permanent());
        assert_eq!(err.operation_type(), "file_system");
    }

    #[test]
    fn watch_and_cancel_classification() {
        let err = CoreError::watch("/srv", "inotify limit reached");
        assert_eq!(err.operation_type(), "watch");
        assert!(!err.is_transient());
        assert!(err.to_string().contains("inotify limit reached"));

        assert!(CoreError::Cancelled.is_cancelled());
        assert!(!err.is_cancelled());
    }

    #[test]
    fn clones_keep_the_variant() {
        let err = CoreError::from_io("/srv", io::Error::from(ErrorKind::TimedOut));
        let copy = err.clone();
        assert!(copy.is_transient());
        assert_eq!(err.to_string(), copy.to_string());
    }
}
