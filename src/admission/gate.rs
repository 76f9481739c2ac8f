//! 准入门：tier 解析 + 固定窗口限流

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, trace};

use super::store::AdmissionStore;
use super::tier::{Level, TierRules};
use crate::errors::{IpsightError, Result, messages};

/// 计数器 key 的来源
///
/// 提供了 credential 时只使用 credential 计数，不再同时按来源地址计数。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterKey {
    Credential(String),
    Address(String),
}

impl CounterKey {
    pub fn for_request(credential: Option<&str>, client_addr: &str) -> Self {
        match credential {
            Some(c) if !c.is_empty() => CounterKey::Credential(c.to_string()),
            _ => CounterKey::Address(client_addr.to_string()),
        }
    }

    /// 带命名空间前缀的存储 key
    pub fn storage_key(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self)
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CounterKey::Credential(c) => write!(f, "ratelimit:apikey:{}", c),
            CounterKey::Address(a) => write!(f, "ratelimit:ip:{}", a),
        }
    }
}

/// 准入结果，挂到请求上下文供后续处理使用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub level: Level,
    /// 仅在提供了 credential 时存在
    pub quota: Option<u64>,
    pub credential: Option<String>,
}

pub struct AdmissionGate {
    store: Arc<dyn AdmissionStore>,
    rules: TierRules,
    key_prefix: String,
}

impl AdmissionGate {
    pub fn new(
        store: Arc<dyn AdmissionStore>,
        rules: TierRules,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            rules,
            key_prefix: key_prefix.into(),
        }
    }

    pub fn rules(&self) -> &TierRules {
        &self.rules
    }

    pub fn store(&self) -> Arc<dyn AdmissionStore> {
        Arc::clone(&self.store)
    }

    /// 解析 tier 并计数
    ///
    /// - 未提供 credential：Basic 规则，按 `client_addr` 计数
    /// - credential 未命中缓存：`InvalidCredential`
    /// - 缓存读取或反序列化失败、计数失败：`ServiceError`
    /// - 自增后的计数超过规则上限：`RateLimited`
    pub async fn admit(&self, credential: Option<&str>, client_addr: &str) -> Result<Admission> {
        let credential = credential.filter(|c| !c.is_empty());

        let (level, quota) = match credential {
            Some(c) => match self.store.get_tier(c).await {
                Ok(Some(entry)) => (entry.level, Some(entry.quota)),
                Ok(None) => {
                    debug!("Unknown workspace credential rejected");
                    return Err(IpsightError::invalid_credential(messages::INVALID_CREDENTIAL));
                }
                Err(e) => {
                    error!("Tier lookup failed via {}: {}", self.store.name(), e);
                    return Err(IpsightError::service_error(e.message()));
                }
            },
            None => (Level::Basic, None),
        };

        let rule = self.rules.rule_for(level);
        let key = CounterKey::for_request(credential, client_addr).storage_key(&self.key_prefix);

        let count = self.store.hit(&key, rule.window).await.map_err(|e| {
            error!("Rate counter failed for {}: {}", key, e);
            IpsightError::service_error(e.message())
        })?;

        if count > rule.max_requests {
            debug!(
                "Rate limited: key={} count={} max={} level={}",
                key, count, rule.max_requests, level
            );
            return Err(IpsightError::rate_limited(messages::RATE_LIMITED));
        }

        trace!("Admitted: key={} count={} level={}", key, count, level);
        Ok(Admission {
            level,
            quota,
            credential: credential.map(str::to_string),
        })
    }
}
