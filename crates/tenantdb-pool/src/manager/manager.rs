//! Tenant pool manager implementation

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::FutureExt;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use tenantdb_core::{ConnectError, PoolFactory, PoolManagerError, Result};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use super::builder::TenantPoolManagerBuilder;
use super::coordinator::{InFlightCreations, SharedCreation};
use super::lifecycle::{self, LifecycleHooks, PoolCreated, PoolEvicted};
use super::stats::ManagerStats;
use super::warmup::{TenantWarmup, WarmupOutcome, WarmupReport};
use crate::config::{PoolSettings, SchemaNameTemplate};
use crate::health::{HealthCheckConfig, HealthReport, TenantHealth, check_pool};
use crate::registry::{EntryState, EvictedPool, EvictionReason, PoolRegistry};
use crate::retry::{RetryConfig, with_retry};

/// Everything guarded by the manager's single mutex
struct ManagerState<P> {
    registry: PoolRegistry<P>,
    in_flight: InFlightCreations<P>,
}

struct ManagerInner<F: PoolFactory> {
    factory: Arc<F>,
    settings: PoolSettings,
    schema_names: SchemaNameTemplate,
    retry: RetryConfig<ConnectError>,
    hooks: LifecycleHooks,
    /// Registry and in-flight map; never held across an await
    state: Mutex<ManagerState<F::Pool>>,
    sweeper: CancellationToken,
    /// Background pool closes; `dispose()` waits for all of them
    close_tasks: TaskTracker,
    sweeper_started: AtomicBool,
    dispose_started: AtomicBool,
}

/// Outcome of the locked lookup step of an acquire
enum Lookup<P> {
    Hit(Arc<P>),
    Wait(SharedCreation<P>),
}

/// Creates, caches, ages out and disposes of per-tenant pools
///
/// Cloning the manager is cheap; all clones share one registry. Handles
/// returned by [`acquire`](Self::acquire) stay valid until the tenant's entry
/// is evicted, after which the underlying pool has been closed and callers
/// must acquire again.
pub struct TenantPoolManager<F: PoolFactory> {
    inner: Arc<ManagerInner<F>>,
}

impl<F: PoolFactory> Clone for TenantPoolManager<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: PoolFactory> TenantPoolManager<F> {
    /// Start configuring a manager around `factory`
    pub fn builder(factory: F) -> TenantPoolManagerBuilder<F> {
        TenantPoolManagerBuilder::new(factory)
    }

    /// Create a manager with the given settings and no hooks
    pub fn new(factory: F, settings: PoolSettings) -> Result<Self> {
        Self::builder(factory).settings(settings).build()
    }

    pub(crate) fn from_parts(
        factory: F,
        settings: PoolSettings,
        schema_names: SchemaNameTemplate,
        retry: RetryConfig<ConnectError>,
        hooks: LifecycleHooks,
    ) -> Self {
        let registry = PoolRegistry::new(settings.max_pools, settings.pool_ttl());
        tracing::debug!(
            max_pools = settings.max_pools,
            pool_ttl_ms = settings.pool_ttl_ms,
            max_attempts = retry.max_attempts(),
            "tenant pool manager created"
        );

        Self {
            inner: Arc::new(ManagerInner {
                factory: Arc::new(factory),
                settings,
                schema_names,
                retry,
                hooks,
                state: Mutex::new(ManagerState {
                    registry,
                    in_flight: InFlightCreations::new(),
                }),
                sweeper: CancellationToken::new(),
                close_tasks: TaskTracker::new(),
                sweeper_started: AtomicBool::new(false),
                dispose_started: AtomicBool::new(false),
            }),
        }
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.inner.settings
    }

    pub fn factory(&self) -> &F {
        &self.inner.factory
    }

    /// Get the tenant's pool, creating it if needed
    ///
    /// Concurrent calls for a tenant without a cached pool share a single
    /// creation and all observe its outcome.
    #[tracing::instrument(skip(self))]
    pub async fn acquire(&self, tenant_id: &str) -> Result<Arc<F::Pool>> {
        self.acquire_inner(tenant_id, None).await.map(|(pool, _)| pool)
    }

    /// Like [`acquire`](Self::acquire) with a retry configuration for this call
    ///
    /// When the call joins a creation already in flight, that creation keeps
    /// the configuration it was started with.
    #[tracing::instrument(skip(self, retry))]
    pub async fn acquire_with(
        &self,
        tenant_id: &str,
        retry: &RetryConfig<ConnectError>,
    ) -> Result<Arc<F::Pool>> {
        self.acquire_inner(tenant_id, Some(retry))
            .await
            .map(|(pool, _)| pool)
    }

    /// Make sure the tenant's pool exists without keeping a handle
    #[tracing::instrument(skip(self))]
    pub async fn warmup(&self, tenant_id: &str) -> Result<WarmupOutcome> {
        let (_, already_warm) = self.acquire_inner(tenant_id, None).await?;
        Ok(WarmupOutcome { already_warm })
    }

    /// Warm several tenants, at most `concurrency` at a time
    #[tracing::instrument(skip(self, tenant_ids), fields(count = tenant_ids.len()))]
    pub async fn warmup_many<S: AsRef<str>>(
        &self,
        tenant_ids: &[S],
        concurrency: usize,
    ) -> WarmupReport {
        let tenants: Vec<TenantWarmup> = stream::iter(tenant_ids.iter().map(|id| id.as_ref()))
            .map(|tenant_id| async move {
                let start = Instant::now();
                let result = self.warmup(tenant_id).await;
                TenantWarmup {
                    tenant_id: tenant_id.to_string(),
                    result,
                    duration: start.elapsed(),
                }
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let report = WarmupReport { tenants };
        tracing::info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            already_warm = report.already_warm(),
            "warmup finished"
        );
        report
    }

    async fn acquire_inner(
        &self,
        tenant_id: &str,
        retry: Option<&RetryConfig<ConnectError>>,
    ) -> Result<(Arc<F::Pool>, bool)> {
        validate_tenant_id(tenant_id)?;
        let mut revalidated = false;

        loop {
            let lookup = {
                let mut state = self.inner.state.lock();
                if state.registry.is_disposed() {
                    return Err(PoolManagerError::Disposed);
                }
                match state.registry.lookup(tenant_id, Instant::now()) {
                    Some(pool) => Lookup::Hit(pool),
                    None => Lookup::Wait(self.join_or_start(&mut state, tenant_id, retry)),
                }
            };

            match lookup {
                Lookup::Hit(pool) => {
                    if self.inner.settings.validate_on_acquire && !revalidated {
                        let (status, _) = check_pool(
                            &*self.inner.factory,
                            &*pool,
                            self.inner.settings.health_check_timeout(),
                        )
                        .await;
                        if !status.is_healthy() {
                            tracing::warn!(?status, "cached pool failed validation, recreating");
                            self.evict_if_same(tenant_id, pool, EvictionReason::HealthCheckFailed);
                            revalidated = true;
                            continue;
                        }
                    }
                    tracing::debug!("pool cache hit");
                    return Ok((pool, true));
                }
                Lookup::Wait(creation) => {
                    return creation.await.map(|pool| (pool, false));
                }
            }
        }
    }

    /// Join the tenant's in-flight creation or start one. Called under the lock.
    fn join_or_start(
        &self,
        state: &mut ManagerState<F::Pool>,
        tenant_id: &str,
        retry: Option<&RetryConfig<ConnectError>>,
    ) -> SharedCreation<F::Pool> {
        if let Some(existing) = state.in_flight.join(tenant_id) {
            tracing::debug!("joining in-flight pool creation");
            return existing;
        }

        let generation = state.in_flight.next_generation();
        let inner = Arc::clone(&self.inner);
        let owned_tenant = tenant_id.to_string();
        let retry = retry.cloned().unwrap_or_else(|| self.inner.retry.clone());
        let span = tracing::info_span!("create_pool", tenant_id = %tenant_id, generation);

        let creation = async move { inner.create_pool(owned_tenant, generation, retry).await }
            .instrument(span)
            .boxed()
            .shared();
        state.in_flight.register(tenant_id, generation, &creation);
        creation
    }

    /// Number of cached pools
    pub fn get_pool_count(&self) -> usize {
        self.inner.state.lock().registry.len()
    }

    pub fn has_pool(&self, tenant_id: &str) -> bool {
        self.inner.state.lock().registry.contains(tenant_id)
    }

    /// Tenants with a cached pool, in no particular order
    pub fn active_tenant_ids(&self) -> Vec<String> {
        self.inner.state.lock().registry.tenant_ids()
    }

    /// Resolve the schema or database name a tenant's pool binds to
    pub fn schema_name_for(&self, tenant_id: &str) -> Result<String> {
        validate_tenant_id(tenant_id)?;
        self.inner.schema_names.resolve(tenant_id)
    }

    /// `Ready` if cached, `Creating` if a creation is in flight
    pub fn tenant_state(&self, tenant_id: &str) -> Option<EntryState> {
        let creation = {
            let state = self.inner.state.lock();
            if state.registry.contains(tenant_id) {
                return Some(EntryState::Ready);
            }
            state.in_flight.upgrade(tenant_id)
        };
        creation.map(|_| EntryState::Creating)
    }

    /// Point-in-time statistics
    pub fn stats(&self) -> ManagerStats {
        let (pool_count, max_pools, disposed, creations) = {
            let state = self.inner.state.lock();
            (
                state.registry.len(),
                state.registry.capacity(),
                state.registry.is_disposed(),
                state.in_flight.live(),
            )
        };
        let in_flight = creations.len();
        drop(creations);
        ManagerStats::new(pool_count, max_pools, in_flight, disposed)
    }

    /// Evict a tenant's pool and close it
    #[tracing::instrument(skip(self))]
    pub async fn evict(&self, tenant_id: &str) -> Option<PoolEvicted> {
        let evicted = self
            .inner
            .state
            .lock()
            .registry
            .remove(tenant_id, EvictionReason::Manual)?;
        self.inner.close_evicted(vec![evicted]).await.pop()
    }

    fn evict_if_same(&self, tenant_id: &str, pool: Arc<F::Pool>, reason: EvictionReason) {
        let evicted = self
            .inner
            .state
            .lock()
            .registry
            .remove_if_same(tenant_id, &pool, reason);
        // Release our handle so a drain does not wait on it
        drop(pool);
        if let Some(evicted) = evicted {
            self.inner.close_in_background(vec![evicted]);
        }
    }

    /// Evict every pool idle for at least the TTL
    ///
    /// Returns the number of pools evicted.
    #[tracing::instrument(skip(self))]
    pub async fn sweep_expired(&self) -> usize {
        self.inner.sweep_expired().await
    }

    /// Spawn the periodic TTL sweeper on the current tokio runtime
    ///
    /// Returns false when already running, when TTL or the sweep interval
    /// is zero, or after `dispose()`. The task holds only a weak reference
    /// to the manager and stops on `dispose()`.
    pub fn start_sweeper(&self) -> bool {
        let period = self.inner.settings.sweep_interval();
        if period.is_zero() || self.inner.settings.pool_ttl().is_zero() {
            return false;
        }
        if self.inner.dispose_started.load(Ordering::SeqCst)
            || self.inner.sweeper_started.swap(true, Ordering::SeqCst)
        {
            return false;
        }

        let weak = Arc::downgrade(&self.inner);
        let token = self.inner.sweeper.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        let Some(inner) = weak.upgrade() else { break };
                        let evicted = inner.sweep_expired().await;
                        if evicted > 0 {
                            tracing::debug!(evicted, "periodic sweep evicted idle pools");
                        }
                    }
                }
            }
            tracing::debug!("pool sweeper stopped");
        });
        tracing::debug!(interval_ms = period.as_millis() as u64, "pool sweeper started");
        true
    }

    /// Check every cached pool
    ///
    /// With `evict_unhealthy`, pools that fail the health check are evicted with
    /// `health_check_failed`.
    #[tracing::instrument(skip(self, config))]
    pub async fn check_health(&self, config: &HealthCheckConfig) -> Result<HealthReport> {
        let pools = {
            let state = self.inner.state.lock();
            if state.registry.is_disposed() {
                return Err(PoolManagerError::Disposed);
            }
            state.registry.pools()
        };

        let factory = &*self.inner.factory;
        let results = futures::future::join_all(pools.into_iter().map(|(tenant_id, pool)| {
            let timeout = config.check_timeout;
            async move {
                let (status, latency) = check_pool(factory, &*pool, timeout).await;
                (tenant_id, pool, status, latency)
            }
        }))
        .await;

        let mut tenants = Vec::with_capacity(results.len());
        let mut evictions = Vec::new();
        {
            let mut state = self.inner.state.lock();
            for (tenant_id, pool, status, latency) in results {
                let mut evicted = false;
                if config.evict_unhealthy && !status.is_healthy() {
                    if let Some(entry) = state.registry.remove_if_same(
                        &tenant_id,
                        &pool,
                        EvictionReason::HealthCheckFailed,
                    ) {
                        evictions.push(entry);
                        evicted = true;
                    }
                }
                tenants.push(TenantHealth {
                    tenant_id,
                    status,
                    latency,
                    evicted,
                });
            }
        }

        if !evictions.is_empty() {
            self.inner.close_evicted(evictions).await;
        }

        let report = HealthReport { tenants };
        tracing::info!(
            healthy = report.healthy_count(),
            unhealthy = report.unhealthy_count(),
            "health check finished"
        );
        Ok(report)
    }

    /// Close every cached pool and refuse further work
    ///
    /// Resolves once every pool evicted so far, including closes still
    /// running in the background, has been closed. Creations still in flight
    /// finish and close their pool immediately; their waiters receive
    /// `PoolManagerError::Disposed`. Later or concurrent calls wait for the
    /// same closes and do nothing else.
    #[tracing::instrument(skip(self))]
    pub async fn dispose(&self) {
        if self.inner.dispose_started.swap(true, Ordering::SeqCst) {
            tracing::debug!("dispose already started, waiting for pool closes");
        } else {
            self.inner.sweeper.cancel();

            let evicted = self.inner.state.lock().registry.dispose();
            tracing::info!(count = evicted.len(), "disposing tenant pools");
            self.inner.close_in_background(evicted);
            self.inner.close_tasks.close();
        }
        self.inner.close_tasks.wait().await;
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.state.lock().registry.is_disposed()
    }
}

impl<F: PoolFactory> ManagerInner<F> {
    /// Body of a shared creation: resolve, create with retry, insert
    async fn create_pool(
        &self,
        tenant_id: String,
        generation: u64,
        retry: RetryConfig<ConnectError>,
    ) -> Result<Arc<F::Pool>> {
        let schema_name = match self.schema_names.resolve(&tenant_id) {
            Ok(name) => name,
            Err(e) => {
                self.state.lock().in_flight.finish(&tenant_id, generation);
                return Err(e);
            }
        };

        tracing::debug!(schema_name = %schema_name, "creating tenant pool");
        let factory = &*self.factory;
        let created = with_retry(|| factory.create(&schema_name), &retry).await;

        let outcome = match created {
            Ok(outcome) => outcome,
            Err(failure) => {
                self.state.lock().in_flight.finish(&tenant_id, generation);
                tracing::error!(
                    attempts = failure.attempts,
                    elapsed_ms = failure.elapsed.as_millis() as u64,
                    error = %failure.error,
                    "failed to create tenant pool"
                );
                return Err(PoolManagerError::TenantCreation {
                    tenant_id,
                    attempts: failure.attempts,
                    elapsed: failure.elapsed,
                    source: failure.error,
                });
            }
        };

        let pool = Arc::new(outcome.value);
        let inserted = {
            let mut state = self.state.lock();
            state.in_flight.finish(&tenant_id, generation);
            state.registry.insert(
                &tenant_id,
                Arc::clone(&pool),
                schema_name.clone(),
                Instant::now(),
            )
        };

        let evicted = match inserted {
            Ok(evicted) => evicted,
            Err(e) => {
                tracing::info!("manager disposed during creation, closing new pool");
                let close = lifecycle::close_orphan(Arc::clone(&self.factory), tenant_id, pool);
                if let Err(join_err) = self.close_tasks.spawn(close).await {
                    tracing::error!(error = %join_err, "pool close task failed");
                }
                return Err(e);
            }
        };

        // Victims close in the background so other tenants never wait on them
        self.close_in_background(evicted);

        let event = PoolCreated {
            tenant_id,
            schema_name,
            attempts: outcome.attempts,
            elapsed: outcome.elapsed,
        };
        tracing::info!(
            schema_name = %event.schema_name,
            attempts = event.attempts,
            elapsed_ms = event.elapsed.as_millis() as u64,
            "tenant pool created"
        );
        self.hooks.pool_created(&event);
        Ok(pool)
    }

    async fn sweep_expired(&self) -> usize {
        let expired = self.state.lock().registry.take_expired(Instant::now());
        let count = expired.len();
        if count > 0 {
            self.close_evicted(expired).await;
        }
        count
    }

    fn drain_timeout(&self) -> Option<Duration> {
        self.settings
            .drain_before_close
            .then(|| self.settings.drain_timeout())
    }

    /// Spawn one tracked close task per evicted pool
    ///
    /// Cancelling the caller cannot abandon a half-closed pool.
    fn spawn_closes(&self, evicted: Vec<EvictedPool<F::Pool>>) -> Vec<JoinHandle<PoolEvicted>> {
        let drain_timeout = self.drain_timeout();
        evicted
            .into_iter()
            .map(|entry| {
                self.close_tasks.spawn(lifecycle::close_evicted_pool(
                    Arc::clone(&self.factory),
                    entry,
                    drain_timeout,
                    self.hooks.clone(),
                ))
            })
            .collect()
    }

    /// Close evicted pools without waiting for them
    fn close_in_background(&self, evicted: Vec<EvictedPool<F::Pool>>) {
        if !evicted.is_empty() {
            tracing::debug!(count = evicted.len(), "closing evicted pools in background");
            drop(self.spawn_closes(evicted));
        }
    }

    /// Close evicted pools concurrently and wait for all of them
    async fn close_evicted(&self, evicted: Vec<EvictedPool<F::Pool>>) -> Vec<PoolEvicted> {
        let tasks = self.spawn_closes(evicted);

        let mut events = Vec::new();
        for joined in futures::future::join_all(tasks).await {
            match joined {
                Ok(event) => events.push(event),
                Err(e) => tracing::error!(error = %e, "pool close task failed"),
            }
        }
        events
    }
}

impl<F: PoolFactory> Drop for ManagerInner<F> {
    fn drop(&mut self) {
        self.sweeper.cancel();
        let remaining = self.state.get_mut().registry.len();
        if remaining > 0 {
            tracing::warn!(
                remaining,
                "tenant pool manager dropped without dispose(), pools were not closed"
            );
        }
    }
}

fn validate_tenant_id(tenant_id: &str) -> Result<()> {
    if tenant_id.trim().is_empty() {
        return Err(PoolManagerError::InvalidTenantId(
            "tenant id cannot be empty".into(),
        ));
    }
    Ok(())
}
