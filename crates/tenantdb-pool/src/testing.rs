//! Shared fixtures for unit tests

use std::collections::{HashSet, VecDeque};
use std::sync::Once;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tenantdb_core::{ConnectError, ErrorCategory, PoolFactory};

use crate::config::{PoolSettings, RetrySettings};

/// Initialize test logging once per process
pub(crate) fn init_test_logging() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tenantdb_pool=debug"));
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .finish();

        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

/// Settings with deterministic backoff (no jitter)
pub(crate) fn test_settings() -> PoolSettings {
    PoolSettings::default().with_retry(RetrySettings {
        max_attempts: 3,
        initial_delay_ms: 100,
        max_delay_ms: 5_000,
        backoff_multiplier: 2.0,
        jitter: false,
    })
}

/// Pool handed out by [`MockFactory`]
#[derive(Debug)]
pub(crate) struct MockPool {
    pub id: usize,
    pub schema_name: String,
    pub healthy: AtomicBool,
    pub hang_on_check: AtomicBool,
    pub closed: AtomicBool,
}

impl MockPool {
    fn new(id: usize, schema_name: &str) -> Self {
        Self {
            id,
            schema_name: schema_name.to_string(),
            healthy: AtomicBool::new(true),
            hang_on_check: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Scriptable factory that records every call
#[derive(Default)]
pub(crate) struct MockFactory {
    create_calls: AtomicUsize,
    create_delay: Mutex<Duration>,
    /// Errors returned by the next create calls, in order
    scripted_failures: Mutex<VecDeque<ConnectError>>,
    /// Error returned by every create call once the script is empty
    always_fail: Mutex<Option<ConnectError>>,
    /// Schemas whose creation always fails permanently
    failing_schemas: Mutex<HashSet<String>>,
    fail_close: AtomicBool,
    close_delay: Mutex<Duration>,
    closed: Mutex<Vec<String>>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_create_delay(self, delay: Duration) -> Self {
        *self.create_delay.lock() = delay;
        self
    }

    pub fn with_close_delay(self, delay: Duration) -> Self {
        *self.close_delay.lock() = delay;
        self
    }

    pub fn fail_next(&self, error: ConnectError) {
        self.scripted_failures.lock().push_back(error);
    }

    pub fn fail_always(&self, error: ConnectError) {
        *self.always_fail.lock() = Some(error);
    }

    pub fn fail_schema(&self, schema_name: &str) {
        self.failing_schemas.lock().insert(schema_name.to_string());
    }

    pub fn fail_close(&self) {
        self.fail_close.store(true, Ordering::SeqCst);
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Schema names of closed pools, in close order
    pub fn closed(&self) -> Vec<String> {
        self.closed.lock().clone()
    }
}

#[async_trait]
impl PoolFactory for MockFactory {
    type Pool = MockPool;

    async fn create(&self, schema_name: &str) -> Result<MockPool, ConnectError> {
        let id = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;

        let delay = *self.create_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.failing_schemas.lock().contains(schema_name) {
            return Err(ConnectError::permanent(
                ErrorCategory::Configuration,
                format!("schema \"{schema_name}\" does not exist"),
            ));
        }
        let scripted = self.scripted_failures.lock().pop_front();
        if let Some(error) = scripted {
            return Err(error);
        }
        let always = self.always_fail.lock().clone();
        if let Some(error) = always {
            return Err(error);
        }

        Ok(MockPool::new(id, schema_name))
    }

    async fn is_healthy(&self, pool: &MockPool) -> bool {
        if pool.hang_on_check.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        pool.healthy.load(Ordering::SeqCst)
    }

    async fn close(&self, pool: &MockPool) -> Result<(), ConnectError> {
        let delay = *self.close_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        pool.closed.store(true, Ordering::SeqCst);
        self.closed.lock().push(pool.schema_name.clone());
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(ConnectError::unclassified("connection already terminated"));
        }
        Ok(())
    }
}
