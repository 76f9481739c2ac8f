//! 准入层
//!
//! 把不透明的 workspace credential 转换为等级与 quota，并执行固定窗口限流：
//! `Unauthenticated → TierResolved → RateChecked → (QuotaChecked) → Admitted | Rejected`

pub mod gate;
pub mod memory;
pub mod quota;
pub mod redis;
pub mod registry;
pub mod store;
pub mod tier;

pub use gate::{Admission, AdmissionGate, CounterKey};
pub use memory::MemoryAdmissionStore;
pub use quota::{QuotaValidator, WorkspaceRegistry};
pub use redis::RedisAdmissionStore;
pub use registry::{MemoryWorkspaceRegistry, SeaOrmWorkspaceRegistry, TierBackedRegistry};
pub use store::{AdmissionStore, RateCounter, TierStore};
pub use tier::{Level, TierCacheEntry, TierRule, TierRules};

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::StaticConfig;
use crate::errors::{IpsightError, Result};

/// 根据配置创建共享缓存后端
///
/// `cache.type = "redis"` 时连接 Redis；`"memory"` 时使用进程内存储（单节点/测试）。
pub async fn build_store(config: &StaticConfig) -> Result<Arc<dyn AdmissionStore>> {
    match config.cache.cache_type.as_str() {
        "redis" => {
            let store = RedisAdmissionStore::connect(
                &config.cache.redis.url,
                &config.cache.tier_key_prefix,
            )
            .await?;
            info!("Admission store: redis ({})", config.cache.redis.url);
            Ok(Arc::new(store))
        }
        "memory" => {
            warn!("Admission store: memory (counters are not shared across instances)");
            Ok(Arc::new(MemoryAdmissionStore::new(
                config.cache.memory.max_capacity,
            )))
        }
        other => Err(IpsightError::config(format!(
            "unknown cache type '{}', expected 'redis' or 'memory'",
            other
        ))),
    }
}

/// 根据配置创建 workspace key 校验器
///
/// 配置了 `database.database_url` 时查询 tasks 表，否则以 tier 缓存中是否存在为准。
pub async fn build_registry(
    config: &StaticConfig,
    store: Arc<dyn AdmissionStore>,
) -> Result<Arc<dyn WorkspaceRegistry>> {
    match config.database.database_url.as_deref() {
        Some(url) if !url.trim().is_empty() => {
            let registry = SeaOrmWorkspaceRegistry::connect(url).await?;
            info!("Workspace registry: database");
            Ok(Arc::new(registry))
        }
        _ => {
            info!("Workspace registry: tier cache");
            Ok(Arc::new(TierBackedRegistry::new(store)))
        }
    }
}
