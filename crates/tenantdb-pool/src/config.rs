//! Pool manager settings
//!
//! Serializable settings are loaded from TOML; hooks, custom classifiers and
//! custom schema-name functions are attached on the manager builder.
//!
//! ```toml
//! max_pools = 100
//! pool_ttl_ms = 600000
//! schema_name_template = "tenant_{tenant_id}"
//!
//! [retry]
//! max_attempts = 5
//! initial_delay_ms = 200
//! ```

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tenantdb_core::{PoolManagerError, Result};

use crate::retry::{BackoffStrategy, RetryConfig};

/// Placeholder replaced by the tenant id in schema name templates
pub const TENANT_ID_PLACEHOLDER: &str = "{tenant_id}";

/// Retry tuning for pool creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total creation tries including the first one
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl RetrySettings {
    pub fn backoff(&self) -> BackoffStrategy {
        BackoffStrategy::new(self.initial_delay_ms, self.max_delay_ms)
            .with_multiplier(self.backoff_multiplier)
            .with_jitter(self.jitter)
    }

    /// Build a retry configuration using the default classifier
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig::new(self.max_attempts, self.backoff())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(PoolManagerError::Configuration(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.backoff_multiplier.is_nan() || self.backoff_multiplier <= 1.0 {
            return Err(PoolManagerError::Configuration(format!(
                "retry.backoff_multiplier must be greater than 1, got {}",
                self.backoff_multiplier
            )));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(PoolManagerError::Configuration(format!(
                "retry.max_delay_ms ({}) cannot be less than retry.initial_delay_ms ({})",
                self.max_delay_ms, self.initial_delay_ms
            )));
        }
        Ok(())
    }
}

impl Default for RetrySettings {
    /// Defaults: 3 attempts, 100ms initial, 5s max, 2x multiplier, jitter on
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Settings for a tenant pool manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Maximum number of cached tenant pools
    pub max_pools: usize,
    /// Idle time in milliseconds after which a pool is evicted (0 disables)
    pub pool_ttl_ms: u64,
    /// Interval in milliseconds between background TTL sweeps
    pub sweep_interval_ms: u64,
    /// Wait for callers to release a pool before closing it
    pub drain_before_close: bool,
    /// Upper bound in milliseconds on the drain wait
    pub drain_timeout_ms: u64,
    /// Check cached pools with `PoolFactory::is_healthy` on every acquire
    pub validate_on_acquire: bool,
    /// Timeout in milliseconds for one health check
    pub health_check_timeout_ms: u64,
    /// Schema or database name pattern; `{tenant_id}` is substituted
    pub schema_name_template: String,
    pub retry: RetrySettings,
}

impl PoolSettings {
    /// Parse settings from a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: PoolSettings = toml::from_str(content)
            .map_err(|e| PoolManagerError::Configuration(format!("Invalid settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = ?path, "loading pool settings");
        let content = std::fs::read_to_string(path).map_err(|e| {
            PoolManagerError::Configuration(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_pools == 0 {
            return Err(PoolManagerError::Configuration(
                "max_pools must be greater than 0".into(),
            ));
        }
        if self.schema_name_template.trim().is_empty() {
            return Err(PoolManagerError::Configuration(
                "schema_name_template cannot be empty".into(),
            ));
        }
        self.retry.validate()
    }

    pub fn pool_ttl(&self) -> Duration {
        Duration::from_millis(self.pool_ttl_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_millis(self.health_check_timeout_ms)
    }

    pub fn with_max_pools(mut self, max_pools: usize) -> Self {
        self.max_pools = max_pools;
        self
    }

    pub fn with_pool_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.pool_ttl_ms = ttl_ms;
        self
    }

    pub fn with_sweep_interval_ms(mut self, interval_ms: u64) -> Self {
        self.sweep_interval_ms = interval_ms;
        self
    }

    pub fn with_drain_before_close(mut self, drain: bool, timeout_ms: u64) -> Self {
        self.drain_before_close = drain;
        self.drain_timeout_ms = timeout_ms;
        self
    }

    pub fn with_validate_on_acquire(mut self, validate: bool) -> Self {
        self.validate_on_acquire = validate;
        self
    }

    pub fn with_schema_name_template(mut self, template: impl Into<String>) -> Self {
        self.schema_name_template = template.into();
        self
    }

    pub fn with_retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for PoolSettings {
    /// Defaults:
    /// - max_pools: 50
    /// - pool_ttl: 1 hour
    /// - sweep_interval: 1 minute
    /// - drain_before_close: false (5 second drain timeout when enabled)
    /// - validate_on_acquire: false
    /// - health_check_timeout: 5 seconds
    /// - schema_name_template: `tenant_{tenant_id}`
    fn default() -> Self {
        Self {
            max_pools: 50,
            pool_ttl_ms: 3_600_000,
            sweep_interval_ms: 60_000,
            drain_before_close: false,
            drain_timeout_ms: 5_000,
            validate_on_acquire: false,
            health_check_timeout_ms: 5_000,
            schema_name_template: format!("tenant_{TENANT_ID_PLACEHOLDER}"),
            retry: RetrySettings::default(),
        }
    }
}

/// Maps a tenant id to the schema or database its pool binds to
#[derive(Clone)]
pub enum SchemaNameTemplate {
    /// Text with `{tenant_id}` placeholders
    Pattern(String),
    /// Arbitrary mapping supplied by the host
    Custom(Arc<dyn Fn(&str) -> String + Send + Sync>),
}

impl SchemaNameTemplate {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        SchemaNameTemplate::Custom(Arc::new(f))
    }

    /// Resolve the schema name for `tenant_id`
    pub fn resolve(&self, tenant_id: &str) -> Result<String> {
        let name = match self {
            SchemaNameTemplate::Pattern(pattern) => {
                pattern.replace(TENANT_ID_PLACEHOLDER, tenant_id)
            }
            SchemaNameTemplate::Custom(f) => f(tenant_id),
        };

        if name.trim().is_empty() {
            return Err(PoolManagerError::InvalidTenantId(format!(
                "'{tenant_id}' resolves to an empty schema name"
            )));
        }
        Ok(name)
    }
}

impl fmt::Debug for SchemaNameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaNameTemplate::Pattern(pattern) => f.debug_tuple("Pattern").field(pattern).finish(),
            SchemaNameTemplate::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = PoolSettings::default();
        settings.validate().unwrap();
        assert_eq!(settings.max_pools, 50);
        assert_eq!(settings.pool_ttl(), Duration::from_secs(3600));
        assert_eq!(settings.schema_name_template, "tenant_{tenant_id}");
        assert_eq!(settings.retry.max_attempts, 3);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let settings = PoolSettings::from_toml_str(
            r#"
            max_pools = 2
            pool_ttl_ms = 1000

            [retry]
            max_attempts = 5
            jitter = false
            "#,
        )
        .unwrap();

        assert_eq!(settings.max_pools, 2);
        assert_eq!(settings.pool_ttl(), Duration::from_millis(1000));
        assert_eq!(settings.sweep_interval(), Duration::from_secs(60));
        assert_eq!(settings.retry.max_attempts, 5);
        assert_eq!(settings.retry.initial_delay_ms, 100);
        assert!(!settings.retry.jitter);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let err = PoolSettings::from_toml_str("max_pools = 0").unwrap_err();
        assert!(matches!(err, PoolManagerError::Configuration(_)));

        let err = PoolSettings::from_toml_str("[retry]\nmax_attempts = 0").unwrap_err();
        assert!(err.to_string().contains("max_attempts"));

        let err = PoolSettings::from_toml_str("[retry]\nbackoff_multiplier = 1.0").unwrap_err();
        assert!(err.to_string().contains("backoff_multiplier"));

        let err = PoolSettings::from_toml_str("[retry]\ninitial_delay_ms = 500\nmax_delay_ms = 100")
            .unwrap_err();
        assert!(err.to_string().contains("max_delay_ms"));

        let err = PoolSettings::from_toml_str("max_pools = \"many\"").unwrap_err();
        assert!(err.to_string().contains("Invalid settings"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_pools = 7\nschema_name_template = \"db_{{tenant_id}}\"").unwrap();

        let settings = PoolSettings::load(file.path()).unwrap();
        assert_eq!(settings.max_pools, 7);
        assert_eq!(settings.schema_name_template, "db_{tenant_id}");

        let err = PoolSettings::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, PoolManagerError::Configuration(_)));
    }

    #[test]
    fn test_retry_settings_to_config() {
        let retry = RetrySettings {
            max_attempts: 4,
            initial_delay_ms: 50,
            max_delay_ms: 400,
            backoff_multiplier: 3.0,
            jitter: false,
        };
        let config = retry.to_retry_config();
        assert_eq!(config.max_attempts(), 4);
        assert_eq!(config.backoff().calculate_delay(1), Duration::from_millis(150));
        assert_eq!(config.backoff().calculate_delay(5), Duration::from_millis(400));
    }

    #[test]
    fn test_schema_name_template() {
        let pattern = SchemaNameTemplate::Pattern("tenant_{tenant_id}".into());
        assert_eq!(pattern.resolve("acme").unwrap(), "tenant_acme");

        let custom = SchemaNameTemplate::custom(|id| format!("db_{}", id.to_uppercase()));
        assert_eq!(custom.resolve("acme").unwrap(), "db_ACME");

        let empty = SchemaNameTemplate::Pattern("{tenant_id}".into());
        assert!(matches!(
            empty.resolve("").unwrap_err(),
            PoolManagerError::InvalidTenantId(_)
        ));
    }
}
