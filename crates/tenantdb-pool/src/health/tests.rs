//! Tests for pool health checking

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tenantdb_core::PoolFactory;

use super::*;
use crate::manager::TenantPoolManager;
use crate::testing::{MockFactory, init_test_logging, test_settings};

#[test]
fn test_report_counts() {
    let report = HealthReport {
        tenants: vec![
            TenantHealth {
                tenant_id: "a".into(),
                status: HealthStatus::Healthy,
                latency: Some(Duration::from_millis(3)),
                evicted: false,
            },
            TenantHealth {
                tenant_id: "b".into(),
                status: HealthStatus::TimedOut,
                latency: None,
                evicted: true,
            },
        ],
    };

    assert_eq!(report.healthy_count(), 1);
    assert_eq!(report.unhealthy_count(), 1);
    assert!(!report.is_healthy());
    assert_eq!(report.unhealthy_tenants(), vec!["b"]);
    assert!(HealthReport::default().is_healthy());
}

#[test]
fn test_status_names() {
    assert_eq!(
        serde_json::to_string(&HealthStatus::TimedOut).unwrap(),
        "\"timed_out\""
    );
    assert_eq!(HealthStatus::default(), HealthStatus::Healthy);
}

#[tokio::test(start_paused = true)]
async fn test_check_timeout() {
    let factory = MockFactory::new();
    let pool = factory.create("tenant_slow").await.unwrap();
    pool.hang_on_check.store(true, Ordering::SeqCst);

    let (status, latency) = check_pool(&factory, &pool, Duration::from_millis(100)).await;

    assert_eq!(status, HealthStatus::TimedOut);
    assert_eq!(latency, None);
}

#[tokio::test(start_paused = true)]
async fn test_check_health_evicts_unhealthy_pools() {
    init_test_logging();
    let factory = Arc::new(MockFactory::new());
    let manager = TenantPoolManager::new(Arc::clone(&factory), test_settings()).unwrap();

    manager.acquire("a").await.unwrap();
    let b = manager.acquire("b").await.unwrap();
    let c = manager.acquire("c").await.unwrap();
    b.healthy.store(false, Ordering::SeqCst);
    c.hang_on_check.store(true, Ordering::SeqCst);
    drop(b);
    drop(c);

    let config = HealthCheckConfig::new(Duration::from_millis(100));
    let report = manager.check_health(&config).await.unwrap();

    assert_eq!(report.tenants.len(), 3);
    assert_eq!(report.healthy_count(), 1);
    let mut unhealthy = report.unhealthy_tenants();
    unhealthy.sort();
    assert_eq!(unhealthy, vec!["b", "c"]);
    assert_eq!(report.tenants.iter().filter(|t| t.evicted).count(), 2);
    assert_eq!(manager.active_tenant_ids(), vec!["a"]);
}

#[tokio::test(start_paused = true)]
async fn test_check_health_report_only() {
    init_test_logging();
    let factory = Arc::new(MockFactory::new());
    let manager = TenantPoolManager::new(Arc::clone(&factory), test_settings()).unwrap();

    let pool = manager.acquire("a").await.unwrap();
    pool.healthy.store(false, Ordering::SeqCst);

    let config = HealthCheckConfig::default().with_evict_unhealthy(false);
    let report = manager.check_health(&config).await.unwrap();

    assert_eq!(report.unhealthy_tenants(), vec!["a"]);
    assert!(!report.tenants[0].evicted);
    assert!(manager.has_pool("a"));
    assert!(factory.closed().is_empty());
}
