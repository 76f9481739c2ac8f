//! 共享缓存抽象：tier 缓存与固定窗口计数器

use std::time::Duration;

use async_trait::async_trait;

use super::tier::TierCacheEntry;
use crate::errors::Result;

/// credential → {level, quota} 的只读缓存
///
/// 条目由外部激活/登录流程写入，本服务只读。
#[async_trait]
pub trait TierStore: Send + Sync {
    /// 未命中返回 `Ok(None)`；连接失败或反序列化失败返回 `ServiceError`
    async fn get_tier(&self, credential: &str) -> Result<Option<TierCacheEntry>>;

    fn name(&self) -> &'static str;
}

/// 固定窗口计数器
#[async_trait]
pub trait RateCounter: Send + Sync {
    /// 原子地自增 `key` 并返回自增后的值
    ///
    /// 仅当本次自增使计数从 0 变为 1 时设置过期时间为 `window`，
    /// 窗口内的后续自增不会延长过期时间。
    async fn hit(&self, key: &str, window: Duration) -> Result<u64>;
}

/// 同时提供 tier 缓存与计数器的后端
pub trait AdmissionStore: TierStore + RateCounter {}

impl<T: TierStore + RateCounter> AdmissionStore for T {}
