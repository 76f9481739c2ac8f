//! 准入层集成测试：tier 解析、固定窗口、quota 校验

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sea_orm::ConnectionTrait;

use ipsight::admission::{
    AdmissionGate, AdmissionStore, Level, MemoryAdmissionStore, MemoryWorkspaceRegistry,
    QuotaValidator, RateCounter, SeaOrmWorkspaceRegistry, TierBackedRegistry, TierCacheEntry,
    TierRule, TierRules, TierStore, WorkspaceRegistry,
};
use ipsight::errors::{IpsightError, Result};

const PREFIX: &str = "ipsight:";

async fn store_with(entries: &[(&str, Level, u64)]) -> Arc<MemoryAdmissionStore> {
    let store = Arc::new(MemoryAdmissionStore::new(1_000));
    for (cred, level, quota) in entries {
        store
            .put_tier(
                cred,
                TierCacheEntry {
                    level: *level,
                    quota: *quota,
                },
            )
            .await;
    }
    store
}

fn gate(store: Arc<MemoryAdmissionStore>, rules: TierRules) -> AdmissionGate {
    AdmissionGate::new(store, rules, PREFIX)
}

#[tokio::test]
async fn test_fixed_window_rejects_then_recovers() {
    let store = store_with(&[("ws", Level::Plus, 50)]).await;
    let rules = TierRules::default().with(Level::Plus, TierRule::new(2, Duration::from_secs(1)));
    let gate = gate(store.clone(), rules);

    let first = gate.admit(Some("ws"), "10.0.0.1").await.unwrap();
    assert_eq!(first.level, Level::Plus);
    assert_eq!(first.quota, Some(50));
    assert_eq!(first.credential.as_deref(), Some("ws"));
    gate.admit(Some("ws"), "10.0.0.1").await.unwrap();

    let third = gate.admit(Some("ws"), "10.0.0.1").await;
    assert!(matches!(third, Err(IpsightError::RateLimited(_))));

    tokio::time::sleep(Duration::from_millis(1100)).await;
    gate.admit(Some("ws"), "10.0.0.1").await.unwrap();

    // 新窗口内已计一次
    let count = store
        .hit("ipsight:ratelimit:apikey:ws", Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn test_unknown_credential_is_rejected_before_counting() {
    let store = store_with(&[]).await;
    let gate = gate(store.clone(), TierRules::default());

    let result = gate.admit(Some("nope"), "10.0.0.1").await;
    assert!(matches!(result, Err(IpsightError::InvalidCredential(_))));
    assert_eq!(store.counter_len(), 0);
}

#[tokio::test]
async fn test_anonymous_requests_use_basic_rule_per_address() {
    let store = store_with(&[]).await;
    let gate = gate(store, TierRules::default());

    let admitted = gate.admit(None, "192.0.2.10").await.unwrap();
    assert_eq!(admitted.level, Level::Basic);
    assert!(admitted.quota.is_none());
    assert!(admitted.credential.is_none());

    // Basic 默认每秒 1 次
    let second = gate.admit(None, "192.0.2.10").await;
    assert!(matches!(second, Err(IpsightError::RateLimited(_))));

    // 其他地址不受影响
    gate.admit(None, "192.0.2.11").await.unwrap();
}

#[tokio::test]
async fn test_empty_credential_is_anonymous() {
    let store = store_with(&[]).await;
    let gate = gate(store, TierRules::default());

    let admitted = gate.admit(Some(""), "192.0.2.20").await.unwrap();
    assert_eq!(admitted.level, Level::Basic);
    assert!(admitted.credential.is_none());
}

#[tokio::test]
async fn test_credential_and_address_counters_are_independent() {
    let store = store_with(&[("ws", Level::Basic, 5)]).await;
    let gate = gate(store, TierRules::default());

    gate.admit(Some("ws"), "198.51.100.1").await.unwrap();
    // 同一地址的匿名请求使用独立的计数器
    gate.admit(None, "198.51.100.1").await.unwrap();

    assert!(matches!(
        gate.admit(Some("ws"), "198.51.100.2").await,
        Err(IpsightError::RateLimited(_))
    ));
}

struct BrokenStore;

#[async_trait]
impl TierStore for BrokenStore {
    async fn get_tier(&self, _credential: &str) -> Result<Option<TierCacheEntry>> {
        Err(IpsightError::service_error("redis: connection refused"))
    }

    fn name(&self) -> &'static str {
        "broken"
    }
}

#[async_trait]
impl RateCounter for BrokenStore {
    async fn hit(&self, _key: &str, _window: Duration) -> Result<u64> {
        Err(IpsightError::service_error("redis: connection refused"))
    }
}

#[tokio::test]
async fn test_store_failure_is_service_error() {
    let store: Arc<dyn AdmissionStore> = Arc::new(BrokenStore);
    let gate = AdmissionGate::new(store, TierRules::default(), PREFIX);

    assert!(matches!(
        gate.admit(Some("ws"), "10.0.0.1").await,
        Err(IpsightError::ServiceError(_))
    ));
    assert!(matches!(
        gate.admit(None, "10.0.0.1").await,
        Err(IpsightError::ServiceError(_))
    ));
}

#[tokio::test]
async fn test_quota_validator_outcomes() {
    let registry = Arc::new(MemoryWorkspaceRegistry::with_keys(["ws-on"]));
    let validator = QuotaValidator::new(registry.clone());

    assert!(validator.validate("ws-on", 10, 10).await.is_ok());
    assert!(matches!(
        validator.validate("ws-on", 11, 10).await,
        Err(IpsightError::QuotaExceeded(_))
    ));
    assert!(matches!(
        validator.validate("ws-off", 1, 10).await,
        Err(IpsightError::InvalidCredential(_))
    ));

    registry.disable("ws-on");
    assert!(matches!(
        validator.validate("ws-on", 1, 10).await,
        Err(IpsightError::InvalidCredential(_))
    ));
}

struct FailingRegistry;

#[async_trait]
impl WorkspaceRegistry for FailingRegistry {
    async fn is_enabled(&self, _workspace_key: &str) -> Result<bool> {
        Err(IpsightError::service_error("database: pool timed out"))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

#[tokio::test]
async fn test_registry_failure_is_service_error() {
    let validator = QuotaValidator::new(Arc::new(FailingRegistry));
    assert!(matches!(
        validator.validate("ws", 1, 10).await,
        Err(IpsightError::ServiceError(_))
    ));
}

#[tokio::test]
async fn test_tier_backed_registry() {
    let store = store_with(&[("ws", Level::Top, 1)]).await;
    let registry = TierBackedRegistry::new(store.clone());

    assert!(registry.is_enabled("ws").await.unwrap());
    assert!(!registry.is_enabled("other").await.unwrap());

    store.remove_tier("ws").await;
    assert!(!registry.is_enabled("ws").await.unwrap());
}

#[tokio::test]
async fn test_database_registry_checks_status_and_soft_delete() {
    let registry = SeaOrmWorkspaceRegistry::connect("sqlite::memory:")
        .await
        .unwrap();
    let db = registry.connection();
    db.execute_unprepared(
        "CREATE TABLE tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            task_key TEXT NOT NULL UNIQUE,
            status INTEGER NOT NULL,
            deleted_at TEXT NULL
        )",
    )
    .await
    .unwrap();
    db.execute_unprepared(
        "INSERT INTO tasks (task_key, status, deleted_at) VALUES
            ('ws-on', 1, NULL),
            ('ws-off', 0, NULL),
            ('ws-del', 1, '2024-01-01 00:00:00')",
    )
    .await
    .unwrap();

    assert!(registry.is_enabled("ws-on").await.unwrap());
    assert!(!registry.is_enabled("ws-off").await.unwrap());
    assert!(!registry.is_enabled("ws-del").await.unwrap());
    assert!(!registry.is_enabled("ws-missing").await.unwrap());

    let validator = QuotaValidator::new(Arc::new(registry));
    assert!(matches!(
        validator.validate("ws-del", 1, 10).await,
        Err(IpsightError::InvalidCredential(_))
    ));
}
