//! Transient vs. permanent classification of pool creation failures

use std::fmt;
use std::sync::Arc;

use tenantdb_core::{ConnectError, ErrorCategory};

/// Lower-case message fragments that identify network-level failures
const NETWORK_PATTERNS: &[&str] = &[
    "econnrefused",
    "econnreset",
    "etimedout",
    "enotfound",
    "ehostunreach",
    "enetunreach",
    "epipe",
    "connection refused",
    "connection reset",
    "timeout",
    "timed out",
    "getaddrinfo",
    "host not found",
    "could not translate host name",
    "name or service not known",
    "no route to host",
    "socket hang up",
    "socket closed",
    "broken pipe",
    "could not connect to server",
];

/// Lower-case message fragments that identify an overloaded or restarting server
const SERVER_CAPACITY_PATTERNS: &[&str] = &[
    "too many connections",
    "too many clients",
    "remaining connection slots are reserved",
    "the database system is starting up",
    "the database system is shutting down",
    "the database system is in recovery mode",
    "server closed the connection unexpectedly",
    "connection terminated unexpectedly",
    "terminating connection due to administrator command",
];

/// Lower-case message fragments that identify TLS negotiation failures
const TLS_PATTERNS: &[&str] = &[
    "ssl connection has been closed unexpectedly",
    "ssl handshake",
    "tls handshake",
    "ssl syscall error",
    "ssl error",
    "tls error",
];

/// Classify a raw driver message into a transient category.
///
/// Matching is case-insensitive. Returns `None` when the message matches no
/// known transient failure, which callers must treat as permanent.
pub fn message_category(message: &str) -> Option<ErrorCategory> {
    let message = message.to_lowercase();
    let matches = |patterns: &[&str]| patterns.iter().any(|p| message.contains(p));

    if matches(SERVER_CAPACITY_PATTERNS) {
        Some(ErrorCategory::ServerCapacity)
    } else if matches(TLS_PATTERNS) {
        Some(ErrorCategory::TlsNegotiation)
    } else if matches(NETWORK_PATTERNS) {
        Some(ErrorCategory::Network)
    } else {
        None
    }
}

/// Default retry predicate for [`ConnectError`].
///
/// A structured category wins over the message text; message matching is the
/// fallback for drivers that only report strings.
pub fn is_retryable(error: &ConnectError) -> bool {
    match error {
        ConnectError::Transient { .. } => true,
        ConnectError::Permanent { .. } => false,
        ConnectError::Unclassified(message) => message_category(message).is_some(),
    }
}

/// Decides whether an error of type `E` should be retried
///
/// A custom classifier replaces the default entirely.
pub struct RetryClassifier<E> {
    predicate: Arc<dyn Fn(&E) -> bool + Send + Sync>,
    custom: bool,
}

impl<E> RetryClassifier<E> {
    /// Build a classifier from an arbitrary predicate
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            custom: true,
        }
    }

    /// Retry every error until attempts run out
    pub fn always() -> Self {
        Self::custom(|_| true)
    }

    /// Never retry
    pub fn never() -> Self {
        Self::custom(|_| false)
    }

    pub fn is_retryable(&self, error: &E) -> bool {
        (self.predicate)(error)
    }

    /// Whether this classifier replaced the default policy
    pub fn is_custom(&self) -> bool {
        self.custom
    }
}

impl RetryClassifier<ConnectError> {
    /// The built-in category and message based policy
    pub fn default_policy() -> Self {
        Self {
            predicate: Arc::new(is_retryable),
            custom: false,
        }
    }
}

impl Default for RetryClassifier<ConnectError> {
    fn default() -> Self {
        Self::default_policy()
    }
}

impl<E> Clone for RetryClassifier<E> {
    fn clone(&self) -> Self {
        Self {
            predicate: Arc::clone(&self.predicate),
            custom: self.custom,
        }
    }
}

impl<E> fmt::Debug for RetryClassifier<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryClassifier")
            .field("custom", &self.custom)
            .finish()
    }
}
