//! Error types for Haptic Link
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - User-friendly messages with suggestions
//! - Exit codes for CLI

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::connection::TaskKind;
use crate::remote::RemoteOperation;

/// Result type alias for haptic-link operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,

    // IO errors (2xx)
    IoRead = 200,
    IoWrite = 201,
    IoPermission = 202,
    IoNotFound = 203,

    // Remote server errors (3xx)
    RemoteConnect = 300,
    RemoteScan = 301,
    RemoteCommand = 302,
    RemoteDisconnect = 303,
    InvalidAddress = 304,

    // Connection state errors (4xx)
    StateConflict = 400,

    // Internal errors (9xx)
    InternalError = 900,
}

impl ErrorCode {
    /// Get the string code (e.g., "E100")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10,
            200..=299 => 20,
            300..=399 => 30,
            400..=499 => 40,
            900..=999 => 90,
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    /// Generic configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    /// File read error
    #[error("Failed to read file: {path}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File write error
    #[error("Failed to write file: {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    // ─────────────────────────────────────────────────────────────
    // Remote Server Errors
    // ─────────────────────────────────────────────────────────────

    /// A call into the remote server client failed
    #[error("Remote {operation} failed: {message}")]
    RemoteOperation {
        operation: RemoteOperation,
        message: String,
    },

    /// Server address could not be parsed or uses an unsupported scheme
    #[error("Invalid server address '{address}': {message}")]
    InvalidAddress { address: String, message: String },

    // ─────────────────────────────────────────────────────────────
    // Connection State Errors
    // ─────────────────────────────────────────────────────────────

    /// A task's precondition on the connection state did not hold
    #[error("State conflict in {task} task: {message}")]
    StateConflict { task: TaskKind, message: String },

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    // ─────────────────────────────────────────────────────────────
    // Error Classification
    // ─────────────────────────────────────────────────────────────

    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,
            Error::Config(_) => ErrorCode::ConfigValidation,

            Error::IoRead { .. } => ErrorCode::IoRead,
            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::IoNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorCode::IoPermission,
                _ => ErrorCode::IoRead,
            },
            Error::Toml(_) => ErrorCode::ConfigParseError,

            Error::RemoteOperation { operation, .. } => match operation {
                RemoteOperation::Connect => ErrorCode::RemoteConnect,
                RemoteOperation::StartScanning | RemoteOperation::StopScanning => {
                    ErrorCode::RemoteScan
                }
                RemoteOperation::SendVibration | RemoteOperation::StopAllDevices => {
                    ErrorCode::RemoteCommand
                }
                RemoteOperation::Disconnect => ErrorCode::RemoteDisconnect,
            },
            Error::InvalidAddress { .. } => ErrorCode::InvalidAddress,

            Error::StateConflict { .. } => ErrorCode::StateConflict,

            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::RemoteOperation { .. }
                | Error::Io(_)
                | Error::IoRead { .. }
                | Error::IoWrite { .. }
        )
    }

    /// Check if the error is fatal (process should exit)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ConfigNotFound { .. }
                | Error::ConfigParse { .. }
                | Error::ConfigValidation { .. }
                | Error::Config(_)
                | Error::Internal(_)
        )
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    // ─────────────────────────────────────────────────────────────
    // User-Friendly Messages
    // ─────────────────────────────────────────────────────────────

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "Run 'haptic-link config init' to create a default configuration file."
            ),
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'haptic-link config validate' to see details."
            ),
            Error::ConfigValidation { .. } | Error::Config(_) => Some(
                "Review the configuration file and fix the invalid values."
            ),

            Error::RemoteOperation { operation: RemoteOperation::Connect, .. } => Some(
                "Make sure the device server is running and listening on the configured address."
            ),
            Error::RemoteOperation { .. } => Some(
                "The device server rejected a request. Reconnecting usually clears this up."
            ),
            Error::InvalidAddress { .. } => Some(
                "Server addresses look like 'ws://127.0.0.1:12345'."
            ),

            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let code = self.code();
        let suggestion = self.suggestion();

        let mut output = format!(
            "\x1b[31mError [{}]\x1b[0m: {}\n",
            code.as_str(),
            self
        );

        if let Some(hint) = suggestion {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }

    /// Format the error for logging (no colors)
    pub fn format_for_log(&self) -> String {
        format!("[{}] {}", self.code().as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Error::ConfigNotFound {
            path: path.into(),
            source: None,
        }
    }

    /// Create a config validation error
    pub fn config_validation(message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a config validation error with field name
    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a remote operation failure
    pub fn remote(operation: RemoteOperation, message: impl Into<String>) -> Self {
        Error::RemoteOperation {
            operation,
            message: message.into(),
        }
    }

    /// Create a state conflict for the given task
    pub fn state_conflict(task: TaskKind, message: impl Into<String>) -> Self {
        Error::StateConflict {
            task,
            message: message.into(),
        }
    }

    /// Create an invalid address error
    pub fn invalid_address(address: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidAddress {
            address: address.into(),
            message: message.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::ConfigNotFound.as_str(), "E100");
        assert_eq!(ErrorCode::RemoteConnect.as_str(), "E300");
        assert_eq!(ErrorCode::StateConflict.as_str(), "E400");
        assert_eq!(ErrorCode::InternalError.as_str(), "E900");
    }

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(ErrorCode::ConfigNotFound.exit_code(), 10);
        assert_eq!(ErrorCode::IoRead.exit_code(), 20);
        assert_eq!(ErrorCode::RemoteDisconnect.exit_code(), 30);
        assert_eq!(ErrorCode::StateConflict.exit_code(), 40);
        assert_eq!(ErrorCode::InternalError.exit_code(), 90);
    }

    #[test]
    fn test_remote_codes_follow_operation() {
        let err = Error::remote(RemoteOperation::Connect, "refused");
        assert_eq!(err.code(), ErrorCode::RemoteConnect);

        let err = Error::remote(RemoteOperation::StopScanning, "gone");
        assert_eq!(err.code(), ErrorCode::RemoteScan);

        let err = Error::remote(RemoteOperation::SendVibration, "device lost");
        assert_eq!(err.code(), ErrorCode::RemoteCommand);

        let err = Error::remote(RemoteOperation::Disconnect, "timeout");
        assert_eq!(err.code(), ErrorCode::RemoteDisconnect);
    }

    #[test]
    fn test_error_display() {
        let err = Error::state_conflict(TaskKind::Connect, "an existing client already exists");
        let text = err.to_string();
        assert!(text.contains("connect"));
        assert!(text.contains("existing client"));

        let err = Error::remote(RemoteOperation::StartScanning, "not allowed");
        assert_eq!(err.to_string(), "Remote start-scanning failed: not allowed");
    }

    #[test]
    fn test_error_retryable() {
        assert!(Error::remote(RemoteOperation::Connect, "refused").is_retryable());
        assert!(!Error::state_conflict(TaskKind::Disconnect, "no client").is_retryable());
        assert!(!Error::config_not_found("/test").is_retryable());
    }

    #[test]
    fn test_error_fatal() {
        assert!(Error::config_not_found("/test").is_fatal());
        assert!(Error::Internal("boom".into()).is_fatal());
        assert!(!Error::remote(RemoteOperation::Connect, "refused").is_fatal());
        assert!(!Error::state_conflict(TaskKind::SendCommand, "not connected").is_fatal());
    }

    #[test]
    fn test_error_suggestions() {
        let err = Error::config_not_found("/test");
        assert!(err.suggestion().unwrap().contains("config init"));

        let err = Error::remote(RemoteOperation::Connect, "refused");
        assert!(err.suggestion().unwrap().contains("device server"));

        let err = Error::invalid_address("localhost", "relative URL without a base");
        assert!(err.suggestion().unwrap().contains("ws://"));

        assert!(Error::state_conflict(TaskKind::ClearAll, "x").suggestion().is_none());
    }

    #[test]
    fn test_format_for_terminal() {
        let err = Error::config_not_found("/test/config.toml");
        let formatted = err.format_for_terminal();

        assert!(formatted.contains("E100"));
        assert!(formatted.contains("\x1b[31m"));
        assert!(formatted.contains("Hint"));
    }

    #[test]
    fn test_format_for_log() {
        let err = Error::remote(RemoteOperation::StopAllDevices, "closed");
        let formatted = err.format_for_log();

        assert!(formatted.starts_with("[E302]"));
        assert!(!formatted.contains("\x1b["));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        assert_eq!(err.code(), ErrorCode::IoNotFound);
    }
}
