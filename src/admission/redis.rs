//! Redis 准入存储
//!
//! - tier 条目：`GET <tier_key_prefix><credential>`，值为 JSON `{"userLevel":n,"quota":n}`
//! - 计数器：Lua 脚本内 `INCR` + 首次 `PEXPIRE`，整体在服务端原子执行

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Script, aio::MultiplexedConnection};
use tokio::sync::RwLock;
use tracing::{debug, error, trace};

use super::store::{RateCounter, TierStore};
use super::tier::TierCacheEntry;
use crate::errors::{IpsightError, Result};

const FIXED_WINDOW_SCRIPT: &str = r#"
local current = redis.call('INCR', KEYS[1])
if current == 1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return current
"#;

pub struct RedisAdmissionStore {
    client: redis::Client,
    /// 持久化连接，使用 RwLock 保护
    connection: Arc<RwLock<Option<MultiplexedConnection>>>,
    tier_key_prefix: String,
    window_script: Script,
}

impl RedisAdmissionStore {
    /// 创建客户端并用 PING 验证连通性
    pub async fn connect(url: &str, tier_key_prefix: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| {
            IpsightError::config(format!("invalid redis url '{}': {}", url, e))
        })?;

        let store = Self {
            client,
            connection: Arc::new(RwLock::new(None)),
            tier_key_prefix: tier_key_prefix.to_string(),
            window_script: Script::new(FIXED_WINDOW_SCRIPT),
        };

        let mut conn = store.get_connection().await.map_err(|e| {
            error!("Failed to connect to Redis at {}: {}", url, e);
            IpsightError::from(e)
        })?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        debug!("Redis connection test successful: {}", pong);

        Ok(store)
    }

    /// 获取或建立持久连接
    async fn get_connection(
        &self,
    ) -> std::result::Result<MultiplexedConnection, redis::RedisError> {
        {
            let conn_guard = self.connection.read().await;
            if let Some(ref conn) = *conn_guard {
                return Ok(conn.clone());
            }
        }

        let mut conn_guard = self.connection.write().await;

        // 双重检查，避免竞态条件
        if let Some(ref conn) = *conn_guard {
            return Ok(conn.clone());
        }

        let new_conn = self.client.get_multiplexed_async_connection().await?;
        *conn_guard = Some(new_conn.clone());
        debug!("Redis connection established and cached");

        Ok(new_conn)
    }

    /// 重置连接（在连接错误时调用）
    async fn reset_connection(&self) {
        let mut conn_guard = self.connection.write().await;
        *conn_guard = None;
        debug!("Redis connection reset due to error");
    }

    fn tier_key(&self, credential: &str) -> String {
        format!("{}{}", self.tier_key_prefix, credential)
    }
}

#[async_trait]
impl TierStore for RedisAdmissionStore {
    async fn get_tier(&self, credential: &str) -> Result<Option<TierCacheEntry>> {
        let key = self.tier_key(credential);

        let mut conn = match self.get_connection().await {
            Ok(c) => c,
            Err(e) => {
                self.reset_connection().await;
                return Err(e.into());
            }
        };

        let raw: Option<String> = match conn.get(&key).await {
            Ok(v) => v,
            Err(e) => {
                error!("Failed to read tier entry '{}': {}", key, e);
                self.reset_connection().await;
                return Err(e.into());
            }
        };

        match raw {
            Some(data) => {
                let entry: TierCacheEntry = serde_json::from_str(&data).map_err(|e| {
                    error!("Malformed tier entry '{}': {}", key, e);
                    IpsightError::from(e)
                })?;
                trace!("Tier entry hit: {} -> {:?}", key, entry);
                Ok(Some(entry))
            }
            None => {
                trace!("Tier entry miss: {}", key);
                Ok(None)
            }
        }
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

#[async_trait]
impl RateCounter for RedisAdmissionStore {
    async fn hit(&self, key: &str, window: Duration) -> Result<u64> {
        let mut conn = match self.get_connection().await {
            Ok(c) => c,
            Err(e) => {
                self.reset_connection().await;
                return Err(e.into());
            }
        };

        let window_ms = window.as_millis().max(1) as u64;
        let count: u64 = match self
            .window_script
            .key(key)
            .arg(window_ms)
            .invoke_async(&mut conn)
            .await
        {
            Ok(c) => c,
            Err(e) => {
                error!("Failed to increment counter '{}': {}", key, e);
                self.reset_connection().await;
                return Err(e.into());
            }
        };

        trace!("Counter {} = {}", key, count);
        Ok(count)
    }
}
