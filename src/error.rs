//! Unified error handling for the sitedesk console
//!
//! This module provides:
//! - Unique error codes for debugging and support requests
//! - Structured error information that keeps backend messages intact
//! - Convenient constructor methods
//! - Automatic conversions from common error types

use std::fmt;
use thiserror::Error;

/// Unified Result type for all sitedesk operations
pub type Result<T> = std::result::Result<T, DeskError>;

/// Error codes for sitedesk operations
///
/// Each error has a unique code in the format `SXXX` where:
/// - S1XX: Authentication and session errors
/// - S2XX: Network and API errors
/// - S3XX: File and I/O errors
/// - S4XX: Configuration errors
/// - S5XX: Validation and input errors
/// - S8XX: UI and interaction errors
/// - S9XX: Internal errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Authentication (S1XX)
    /// S101: Authentication failed
    AuthenticationFailed,
    /// S102: Authorization denied
    AuthorizationDenied,
    /// S103: Session expired and could not be refreshed
    SessionExpired,
    /// S104: Not logged in
    NotLoggedIn,
    /// S105: Refresh was abandoned before it settled
    RefreshAborted,

    // Network (S2XX)
    /// S201: HTTP request failed
    HttpError,
    /// S202: Connection timeout
    ConnectionTimeout,
    /// S204: Connection refused or host unreachable
    ConnectionRefused,
    /// S205: API returned error response
    ApiError,
    /// S206: Invalid API response format
    InvalidResponse,
    /// S207: Backend fault (5xx)
    ServerFault,

    // File/IO (S3XX)
    /// S301: File not found
    FileNotFound,
    /// S302: File read error
    FileReadError,
    /// S303: File write error
    FileWriteError,

    // Configuration (S4XX)
    /// S401: Configuration error
    ConfigError,
    /// S402: Invalid endpoint URL
    InvalidEndpoint,

    // Validation (S5XX)
    /// S501: Invalid input
    InvalidInput,
    /// S502: Validation failed
    ValidationFailed,

    // UI (S8XX)
    /// S801: Dialog error
    DialogError,
    /// S802: User cancelled
    UserCancelled,

    // Internal (S9XX)
    /// S901: Internal error
    InternalError,
    /// S902: Serialization error
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code
    pub fn code(&self) -> u16 {
        match self {
            ErrorCode::AuthenticationFailed => 101,
            ErrorCode::AuthorizationDenied => 102,
            ErrorCode::SessionExpired => 103,
            ErrorCode::NotLoggedIn => 104,
            ErrorCode::RefreshAborted => 105,

            ErrorCode::HttpError => 201,
            ErrorCode::ConnectionTimeout => 202,
            ErrorCode::ConnectionRefused => 204,
            ErrorCode::ApiError => 205,
            ErrorCode::InvalidResponse => 206,
            ErrorCode::ServerFault => 207,

            ErrorCode::FileNotFound => 301,
            ErrorCode::FileReadError => 302,
            ErrorCode::FileWriteError => 303,

            ErrorCode::ConfigError => 401,
            ErrorCode::InvalidEndpoint => 402,

            ErrorCode::InvalidInput => 501,
            ErrorCode::ValidationFailed => 502,

            ErrorCode::DialogError => 801,
            ErrorCode::UserCancelled => 802,

            ErrorCode::InternalError => 901,
            ErrorCode::SerializationError => 902,
        }
    }

    /// Get the string code (e.g., "S101")
    pub fn as_str(&self) -> String {
        format!("S{}", self.code())
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.code())
    }
}

/// Main error type for all sitedesk operations
#[derive(Error, Debug)]
pub enum DeskError {
    // ==================== Authentication Errors (S1XX) ====================
    /// Authentication failed or session unusable
    #[error("[{code}] Authentication failed: {message}")]
    Authentication {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Authorization denied
    #[error("[{code}] Authorization denied: {message}")]
    Authorization { code: ErrorCode, message: String },

    // ==================== Network Errors (S2XX) ====================
    /// No response was received
    #[error("[{code}] Network error: {message}")]
    Network {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// Backend answered with an error status
    ///
    /// `body` keeps the raw response so forms can render backend messages.
    #[error("[{code}] API error ({status}): {message}")]
    Api {
        code: ErrorCode,
        status: u16,
        message: String,
        body: Option<serde_json::Value>,
    },

    // ==================== File/IO Errors (S3XX) ====================
    /// File or IO error
    #[error("[{code}] {context}: {message}")]
    Io {
        code: ErrorCode,
        context: String,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    // ==================== Configuration Errors (S4XX) ====================
    /// Configuration error
    #[error("[{code}] Configuration error: {message}")]
    Config {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<config::ConfigError>,
    },

    // ==================== Validation Errors (S5XX) ====================
    /// Validation error
    #[error("[{code}] Validation error: {message}")]
    Validation {
        code: ErrorCode,
        message: String,
        field: Option<String>,
    },

    /// Invalid input error
    #[error("[{code}] Invalid input: {message}")]
    InvalidInput { code: ErrorCode, message: String },

    // ==================== UI Errors (S8XX) ====================
    /// UI/Dialog error
    #[error("[{code}] UI error: {message}")]
    Ui { code: ErrorCode, message: String },

    // ==================== Internal Errors (S9XX) ====================
    /// Internal/Unexpected error
    #[error("[{code}] Internal error: {message}")]
    Internal { code: ErrorCode, message: String },

    /// JSON or CSV serialization error
    #[error("[{code}] Serialization error: {message}")]
    Serialization {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Timeout error
    #[error("[S202] Operation timed out")]
    Timeout,
}

// ==================== Constructor Methods ====================

impl DeskError {
    // --- Authentication ---

    /// Create authentication error
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            code: ErrorCode::AuthenticationFailed,
            message: message.into(),
            source: None,
        }
    }

    /// Create session expired error (refresh failed, session torn down)
    pub fn session_expired(message: impl Into<String>) -> Self {
        Self::Authentication {
            code: ErrorCode::SessionExpired,
            message: message.into(),
            source: None,
        }
    }

    /// Create not logged in error
    pub fn not_logged_in() -> Self {
        Self::Authentication {
            code: ErrorCode::NotLoggedIn,
            message: "Not logged in. Run `sitedesk login` first.".to_string(),
            source: None,
        }
    }

    /// Create refresh aborted error
    pub fn refresh_aborted() -> Self {
        Self::Authentication {
            code: ErrorCode::RefreshAborted,
            message: "Token refresh was abandoned before it completed".to_string(),
            source: None,
        }
    }

    /// Create authorization error
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            code: ErrorCode::AuthorizationDenied,
            message: message.into(),
        }
    }

    // --- Network ---

    /// Create network error from message
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            code: ErrorCode::HttpError,
            message: message.into(),
            source: None,
        }
    }

    /// Create connection-level error (no response received)
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Network {
            code: ErrorCode::ConnectionRefused,
            message: message.into(),
            source: None,
        }
    }

    /// Create network error from reqwest error
    pub fn network_from_reqwest(err: reqwest::Error) -> Self {
        let code = if err.is_timeout() {
            ErrorCode::ConnectionTimeout
        } else if err.is_connect() {
            ErrorCode::ConnectionRefused
        } else {
            ErrorCode::HttpError
        };

        Self::Network {
            code,
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create API error
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            code: ErrorCode::ApiError,
            status,
            message: message.into(),
            body: None,
        }
    }

    /// Create API error carrying the backend body
    pub fn api_with_body(
        status: u16,
        message: impl Into<String>,
        body: Option<serde_json::Value>,
    ) -> Self {
        Self::Api {
            code: ErrorCode::ApiError,
            status,
            message: message.into(),
            body,
        }
    }

    /// Create server fault error (5xx)
    pub fn server_fault(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            code: ErrorCode::ServerFault,
            status,
            message: message.into(),
            body: None,
        }
    }

    /// Create invalid response error
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::Api {
            code: ErrorCode::InvalidResponse,
            status: 0,
            message: message.into(),
            body: None,
        }
    }

    // --- File/IO ---

    /// Create IO error from std::io::Error
    pub fn io_from_error(context: impl Into<String>, err: std::io::Error) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::FileNotFound,
            std::io::ErrorKind::PermissionDenied => ErrorCode::FileWriteError,
            _ => ErrorCode::FileReadError,
        };

        Self::Io {
            code,
            context: context.into(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create file not found error
    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::Io {
            code: ErrorCode::FileNotFound,
            context: "File not found".to_string(),
            message: path.into(),
            source: None,
        }
    }

    // --- Configuration ---

    /// Create configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            code: ErrorCode::ConfigError,
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration error with source
    pub fn config_from_error(err: config::ConfigError) -> Self {
        Self::Config {
            code: ErrorCode::ConfigError,
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create invalid endpoint error
    pub fn invalid_endpoint(message: impl Into<String>) -> Self {
        Self::Config {
            code: ErrorCode::InvalidEndpoint,
            message: message.into(),
            source: None,
        }
    }

    // --- Validation ---

    /// Create validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            code: ErrorCode::ValidationFailed,
            message: message.into(),
            field: None,
        }
    }

    /// Create validation error with field
    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            code: ErrorCode::ValidationFailed,
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            code: ErrorCode::InvalidInput,
            message: message.into(),
        }
    }

    // --- UI ---

    /// Create UI error
    pub fn ui(message: impl Into<String>) -> Self {
        Self::Ui {
            code: ErrorCode::DialogError,
            message: message.into(),
        }
    }

    /// Create user cancelled error
    pub fn user_cancelled() -> Self {
        Self::Ui {
            code: ErrorCode::UserCancelled,
            message: "Operation cancelled by user".to_string(),
        }
    }

    // --- Internal ---

    /// Create internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            code: ErrorCode::InternalError,
            message: message.into(),
        }
    }

    /// Create serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            code: ErrorCode::SerializationError,
            message: message.into(),
            source: None,
        }
    }

    // --- Utility Methods ---

    /// Get the error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Authentication { code, .. } => *code,
            Self::Authorization { code, .. } => *code,
            Self::Network { code, .. } => *code,
            Self::Api { code, .. } => *code,
            Self::Io { code, .. } => *code,
            Self::Config { code, .. } => *code,
            Self::Validation { code, .. } => *code,
            Self::InvalidInput { code, .. } => *code,
            Self::Ui { code, .. } => *code,
            Self::Internal { code, .. } => *code,
            Self::Serialization { code, .. } => *code,
            Self::Timeout => ErrorCode::ConnectionTimeout,
        }
    }

    /// HTTP status of an API error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } if *status != 0 => Some(*status),
            _ => None,
        }
    }

    /// Check if this is an authentication error
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Self::Authentication { .. } | Self::Authorization { .. }
        ) || self.is_unauthorized()
    }

    /// Check if the backend rejected the credentials (HTTP 401)
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Check if this is a network error
    pub fn is_network_error(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout)
    }

    /// Check if the backend itself failed (5xx)
    pub fn is_server_fault(&self) -> bool {
        matches!(self.status(), Some(s) if s >= 500)
    }
}

// ==================== From Implementations ====================

impl From<std::io::Error> for DeskError {
    fn from(err: std::io::Error) -> Self {
        Self::io_from_error("IO operation", err)
    }
}

impl From<reqwest::Error> for DeskError {
    fn from(err: reqwest::Error) -> Self {
        Self::network_from_reqwest(err)
    }
}

impl From<serde_json::Error> for DeskError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            code: ErrorCode::SerializationError,
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<config::ConfigError> for DeskError {
    fn from(err: config::ConfigError) -> Self {
        Self::config_from_error(err)
    }
}

impl From<dialoguer::Error> for DeskError {
    fn from(err: dialoguer::Error) -> Self {
        Self::Ui {
            code: ErrorCode::DialogError,
            message: format!("Dialog error: {}", err),
        }
    }
}

impl From<csv::Error> for DeskError {
    fn from(err: csv::Error) -> Self {
        Self::serialization(format!("CSV error: {}", err))
    }
}

// Manual Clone implementation that drops non-cloneable sources.
// One refresh failure is handed to every queued caller.
impl Clone for DeskError {
    fn clone(&self) -> Self {
        match self {
            Self::Authentication { code, message, .. } => Self::Authentication {
                code: *code,
                message: message.clone(),
                source: None,
            },
            Self::Authorization { code, message } => Self::Authorization {
                code: *code,
                message: message.clone(),
            },
            Self::Network { code, message, .. } => Self::Network {
                code: *code,
                message: message.clone(),
                source: None,
            },
            Self::Api {
                code,
                status,
                message,
                body,
            } => Self::Api {
                code: *code,
                status: *status,
                message: message.clone(),
                body: body.clone(),
            },
            Self::Io {
                code,
                context,
                message,
                ..
            } => Self::Io {
                code: *code,
                context: context.clone(),
                message: message.clone(),
                source: None,
            },
            Self::Config { code, message, .. } => Self::Config {
                code: *code,
                message: message.clone(),
                source: None,
            },
            Self::Validation {
                code,
                message,
                field,
            } => Self::Validation {
                code: *code,
                message: message.clone(),
                field: field.clone(),
            },
            Self::InvalidInput { code, message } => Self::InvalidInput {
                code: *code,
                message: message.clone(),
            },
            Self::Ui { code, message } => Self::Ui {
                code: *code,
                message: message.clone(),
            },
            Self::Internal { code, message } => Self::Internal {
                code: *code,
                message: message.clone(),
            },
            Self::Serialization { code, message, .. } => Self::Serialization {
                code: *code,
                message: message.clone(),
                source: None,
            },
            Self::Timeout => Self::Timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ErrorCode::AuthenticationFailed.code(), 101);
        assert_eq!(ErrorCode::SessionExpired.code(), 103);
        assert_eq!(ErrorCode::ServerFault.code(), 207);
        assert_eq!(ErrorCode::ConfigError.code(), 401);
    }

    #[test]
    fn test_error_code_string() {
        assert_eq!(ErrorCode::AuthenticationFailed.as_str(), "S101");
        assert_eq!(ErrorCode::HttpError.as_str(), "S201");
    }

    #[test]
    fn test_error_display() {
        let err = DeskError::authentication("Invalid credentials");
        assert!(err.to_string().contains("S101"));
        assert!(err.to_string().contains("Invalid credentials"));
    }

    #[test]
    fn test_status_classification() {
        let unauthorized = DeskError::api(401, "jwt expired");
        assert!(unauthorized.is_unauthorized());
        assert!(unauthorized.is_auth_error());

        let fault = DeskError::server_fault(502, "Bad gateway");
        assert!(fault.is_server_fault());
        assert!(!fault.is_unauthorized());

        assert_eq!(DeskError::invalid_response("garbage").status(), None);
        assert!(DeskError::unreachable("down").is_network_error());
    }

    #[test]
    fn test_clone_keeps_backend_body() {
        let err = DeskError::api_with_body(
            422,
            "Validation failed",
            Some(serde_json::json!({"message": "title is required"})),
        );
        match err.clone() {
            DeskError::Api { status, body, .. } => {
                assert_eq!(status, 422);
                assert_eq!(body.unwrap()["message"], "title is required");
            }
            other => panic!("unexpected clone: {:?}", other),
        }
    }
}
