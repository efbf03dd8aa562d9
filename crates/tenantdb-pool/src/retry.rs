//! Retry support for pool creation
//!
//! This module provides capped exponential backoff, the transient-error
//! classifier and the bounded retry executor the pool manager wraps around
//! every pool creation.
//!
//! # Example
//!
//! ```ignore
//! use tenantdb_pool::retry::{BackoffStrategy, RetryConfig, with_retry};
//!
//! let config = RetryConfig::new(3, BackoffStrategy::new(100, 5_000))
//!     .on_retry(|attempt, err, delay| eprintln!("retry {attempt} in {delay:?}: {err}"));
//!
//! let outcome = with_retry(|| factory.create("tenant_acme"), &config).await?;
//! println!("created after {} attempt(s)", outcome.attempts);
//! ```

mod backoff;
mod classifier;
mod executor;


pub use backoff::BackoffStrategy;
pub use classifier::{RetryClassifier, is_retryable, message_category};
pub use executor::{RetryConfig, RetryFailure, RetryObserver, RetryOutcome, with_retry};
