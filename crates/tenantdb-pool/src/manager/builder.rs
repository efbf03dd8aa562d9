//! Builder for [`TenantPoolManager`]

use std::sync::Arc;
use std::time::Duration;

use tenantdb_core::{ConnectError, PoolFactory, Result};

use super::TenantPoolManager;
use super::lifecycle::{LifecycleHooks, PoolCreated, PoolEvicted};
use crate::config::{PoolSettings, SchemaNameTemplate};
use crate::retry::{RetryClassifier, RetryObserver};

/// Collects settings and hooks for a [`TenantPoolManager`]
///
/// # Example
///
/// ```ignore
/// let manager = TenantPoolManager::builder(factory)
///     .settings(PoolSettings::load("pools.toml")?)
///     .on_pool_evicted(|event| {
///         metrics.record_eviction(&event.tenant_id, event.reason.as_str());
///         Ok(())
///     })
///     .build()?;
/// ```
pub struct TenantPoolManagerBuilder<F: PoolFactory> {
    factory: F,
    settings: PoolSettings,
    schema_names: Option<SchemaNameTemplate>,
    classifier: Option<RetryClassifier<ConnectError>>,
    on_retry: Option<RetryObserver<ConnectError>>,
    hooks: LifecycleHooks,
}

impl<F: PoolFactory> TenantPoolManagerBuilder<F> {
    pub(crate) fn new(factory: F) -> Self {
        Self {
            factory,
            settings: PoolSettings::default(),
            schema_names: None,
            classifier: None,
            on_retry: None,
            hooks: LifecycleHooks::default(),
        }
    }

    pub fn settings(mut self, settings: PoolSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Map tenant ids to schema names with a function instead of
    /// `PoolSettings::schema_name_template`
    pub fn schema_name_fn<S>(mut self, f: S) -> Self
    where
        S: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.schema_names = Some(SchemaNameTemplate::custom(f));
        self
    }

    /// Replace the default transient-error classifier
    pub fn classifier(mut self, classifier: RetryClassifier<ConnectError>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Observe every creation retry
    pub fn on_retry<R>(mut self, observer: R) -> Self
    where
        R: Fn(u32, &ConnectError, Duration) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(observer));
        self
    }

    pub fn on_pool_created<H>(mut self, hook: H) -> Self
    where
        H: Fn(&PoolCreated) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.hooks.on_created = Some(Arc::new(hook));
        self
    }

    pub fn on_pool_evicted<H>(mut self, hook: H) -> Self
    where
        H: Fn(&PoolEvicted) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.hooks.on_evicted = Some(Arc::new(hook));
        self
    }

    /// Validate the settings and construct the manager
    pub fn build(self) -> Result<TenantPoolManager<F>> {
        self.settings.validate()?;

        let schema_names = self.schema_names.unwrap_or_else(|| {
            SchemaNameTemplate::Pattern(self.settings.schema_name_template.clone())
        });

        let mut retry = self.settings.retry.to_retry_config();
        if let Some(classifier) = self.classifier {
            retry = retry.classifier(classifier);
        }
        if let Some(observer) = self.on_retry {
            retry = retry.on_retry(move |attempt, err, delay| observer(attempt, err, delay));
        }

        Ok(TenantPoolManager::from_parts(
            self.factory,
            self.settings,
            schema_names,
            retry,
            self.hooks,
        ))
    }
}
