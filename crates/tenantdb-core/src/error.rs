//! Error types for tenant pool management

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured classification of a pool creation failure
///
/// Drivers that expose error codes should map them onto a category so the
/// retry classifier does not have to inspect message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Connection refused/reset, timeouts, unresolvable hosts, closed sockets
    Network,
    /// Too many connections, server starting up or shutting down
    ServerCapacity,
    /// TLS/SSL handshake failures
    TlsNegotiation,
    /// Bad credentials or missing privileges
    Authentication,
    /// Malformed connection settings
    Configuration,
    /// The server rejected a statement
    Query,
    /// Anything else
    Other,
}

impl ErrorCategory {
    /// Whether failures in this category are worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorCategory::Network | ErrorCategory::ServerCapacity | ErrorCategory::TlsNegotiation
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::ServerCapacity => "server_capacity",
            ErrorCategory::TlsNegotiation => "tls_negotiation",
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Query => "query",
            ErrorCategory::Other => "other",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by a [`PoolFactory`](crate::PoolFactory) when creating or
/// closing an underlying pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    #[error("Transient connection error ({category}): {message}")]
    Transient {
        category: ErrorCategory,
        message: String,
    },

    #[error("Permanent creation error ({category}): {message}")]
    Permanent {
        category: ErrorCategory,
        message: String,
    },

    /// The driver gave no structured code; only the message is known
    #[error("{0}")]
    Unclassified(String),
}

impl ConnectError {
    pub fn transient(category: ErrorCategory, message: impl Into<String>) -> Self {
        ConnectError::Transient {
            category,
            message: message.into(),
        }
    }

    pub fn permanent(category: ErrorCategory, message: impl Into<String>) -> Self {
        ConnectError::Permanent {
            category,
            message: message.into(),
        }
    }

    pub fn unclassified(message: impl Into<String>) -> Self {
        ConnectError::Unclassified(message.into())
    }

    /// The structured category, if the driver supplied one
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            ConnectError::Transient { category, .. } | ConnectError::Permanent { category, .. } => {
                Some(*category)
            }
            ConnectError::Unclassified(_) => None,
        }
    }

    /// The raw driver message without the classification prefix
    pub fn message(&self) -> &str {
        match self {
            ConnectError::Transient { message, .. } | ConnectError::Permanent { message, .. } => {
                message
            }
            ConnectError::Unclassified(message) => message,
        }
    }
}

impl From<std::io::Error> for ConnectError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::BrokenPipe
            | ErrorKind::TimedOut
            | ErrorKind::UnexpectedEof => {
                ConnectError::transient(ErrorCategory::Network, err.to_string())
            }
            ErrorKind::PermissionDenied => {
                ConnectError::permanent(ErrorCategory::Authentication, err.to_string())
            }
            _ => ConnectError::unclassified(err.to_string()),
        }
    }
}

/// Errors surfaced by the tenant pool manager
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolManagerError {
    #[error("Pool manager has been disposed")]
    Disposed,

    #[error(
        "Failed to create pool for tenant '{tenant_id}' after {attempts} attempt(s) in {}ms: {source}",
        .elapsed.as_millis()
    )]
    TenantCreation {
        tenant_id: String,
        attempts: u32,
        elapsed: Duration,
        #[source]
        source: ConnectError,
    },

    #[error("Invalid tenant id: {0}")]
    InvalidTenantId(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl PoolManagerError {
    pub fn is_disposed(&self) -> bool {
        matches!(self, PoolManagerError::Disposed)
    }

    /// The last creation error, when creation was the failing step
    pub fn creation_source(&self) -> Option<&ConnectError> {
        match self {
            PoolManagerError::TenantCreation { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type alias for pool manager operations
pub type Result<T> = std::result::Result<T, PoolManagerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_category_transience() {
        assert!(ErrorCategory::Network.is_transient());
        assert!(ErrorCategory::ServerCapacity.is_transient());
        assert!(ErrorCategory::TlsNegotiation.is_transient());
        assert!(!ErrorCategory::Authentication.is_transient());
        assert!(!ErrorCategory::Configuration.is_transient());
        assert!(!ErrorCategory::Query.is_transient());
        assert!(!ErrorCategory::Other.is_transient());
    }

    #[test]
    fn test_connect_error_category() {
        let err = ConnectError::transient(ErrorCategory::Network, "refused");
        assert_eq!(err.category(), Some(ErrorCategory::Network));
        assert_eq!(err.message(), "refused");

        let err = ConnectError::unclassified("ECONNREFUSED");
        assert_eq!(err.category(), None);
        assert_eq!(err.to_string(), "ECONNREFUSED");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "nope");
        let err = ConnectError::from(io);
        assert_eq!(err.category(), Some(ErrorCategory::Network));

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(
            ConnectError::from(io).category(),
            Some(ErrorCategory::Authentication)
        );

        let io = std::io::Error::other("weird");
        assert_eq!(ConnectError::from(io).category(), None);
    }

    #[test]
    fn test_tenant_creation_display() {
        let err = PoolManagerError::TenantCreation {
            tenant_id: "acme".into(),
            attempts: 3,
            elapsed: Duration::from_millis(300),
            source: ConnectError::unclassified("connection refused"),
        };
        assert_eq!(
            err.to_string(),
            "Failed to create pool for tenant 'acme' after 3 attempt(s) in 300ms: connection refused"
        );
        assert_eq!(
            err.creation_source(),
            Some(&ConnectError::unclassified("connection refused"))
        );
        assert!(!err.is_disposed());
        assert!(PoolManagerError::Disposed.is_disposed());
    }

    #[test]
    fn test_category_serde_names() {
        assert_eq!(ErrorCategory::TlsNegotiation.as_str(), "tls_negotiation");
        assert_eq!(ErrorCategory::ServerCapacity.to_string(), "server_capacity");
    }
}
