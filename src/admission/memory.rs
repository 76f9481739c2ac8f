//! 进程内准入存储
//!
//! tier 条目放在 moka 缓存中，计数器放在 DashMap 中。
//! 单节点部署与测试使用；多实例部署时计数器不共享。

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use moka::future::Cache;
use tracing::{debug, trace};

use super::store::{RateCounter, TierStore};
use super::tier::TierCacheEntry;
use crate::errors::Result;

#[derive(Debug, Clone, Copy)]
struct WindowCounter {
    count: u64,
    expires_at: Instant,
}

pub struct MemoryAdmissionStore {
    tiers: Cache<String, TierCacheEntry>,
    counters: DashMap<String, WindowCounter>,
    max_counters: usize,
}

impl MemoryAdmissionStore {
    pub fn new(max_capacity: u64) -> Self {
        debug!("MemoryAdmissionStore created with capacity {}", max_capacity);
        Self {
            tiers: Cache::builder().max_capacity(max_capacity).build(),
            counters: DashMap::new(),
            max_counters: max_capacity.max(1) as usize,
        }
    }

    /// 写入 tier 条目（对应外部激活/登录流程）
    pub async fn put_tier(&self, credential: &str, entry: TierCacheEntry) {
        self.tiers.insert(credential.to_string(), entry).await;
    }

    pub async fn remove_tier(&self, credential: &str) {
        self.tiers.invalidate(credential).await;
    }

    /// 当前计数器数量（含尚未清理的过期项）
    pub fn counter_len(&self) -> usize {
        self.counters.len()
    }

    fn purge_expired(&self, now: Instant) {
        let before = self.counters.len();
        self.counters.retain(|_, c| c.expires_at > now);
        trace!(
            "Purged {} expired counters",
            before.saturating_sub(self.counters.len())
        );
    }
}

impl Default for MemoryAdmissionStore {
    fn default() -> Self {
        Self::new(100_000)
    }
}

#[async_trait]
impl TierStore for MemoryAdmissionStore {
    async fn get_tier(&self, credential: &str) -> Result<Option<TierCacheEntry>> {
        Ok(self.tiers.get(credential).await)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl RateCounter for MemoryAdmissionStore {
    async fn hit(&self, key: &str, window: Duration) -> Result<u64> {
        let now = Instant::now();

        if self.counters.len() >= self.max_counters && !self.counters.contains_key(key) {
            self.purge_expired(now);
        }

        // entry 持有分片写锁，自增与首次设置过期时间在同一临界区内完成
        let mut counter = self
            .counters
            .entry(key.to_string())
            .or_insert(WindowCounter {
                count: 0,
                expires_at: now,
            });

        if counter.expires_at <= now {
            counter.count = 0;
        }
        counter.count += 1;
        if counter.count == 1 {
            counter.expires_at = now + window;
        }

        Ok(counter.count)
    }
}
