//! 等级与限流规则
//!
//! 等级按权限从低到高全序排列：Basic < Plus < Premium < Top。
//! 每个等级对应一个固定窗口限流规则；quota（单次批量上限）与限流规则相互独立，
//! 由外部流程写入 tier 缓存。

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use strum::{AsRefStr, EnumIter, IntoEnumIterator};

/// 用户等级
///
/// 缓存中以数字存储（0..=3），未知数值视为反序列化失败。
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize_repr,
    Deserialize_repr,
    EnumIter,
    AsRefStr,
)]
#[repr(u8)]
#[strum(serialize_all = "lowercase")]
pub enum Level {
    #[default]
    Basic = 0,
    Plus = 1,
    Premium = 2,
    Top = 3,
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// 固定窗口限流规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierRule {
    pub max_requests: u64,
    pub window: Duration,
}

impl TierRule {
    pub fn new(max_requests: u64, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

/// 等级 → 规则映射
#[derive(Debug, Clone)]
pub struct TierRules {
    rules: BTreeMap<Level, TierRule>,
}

impl Default for TierRules {
    fn default() -> Self {
        let second = Duration::from_secs(1);
        let rules = Level::iter()
            .map(|level| {
                let max = match level {
                    Level::Basic => 1,
                    Level::Plus => 100,
                    Level::Premium => 1000,
                    Level::Top => 5000,
                };
                (level, TierRule::new(max, second))
            })
            .collect();
        Self { rules }
    }
}

impl TierRules {
    pub fn with(mut self, level: Level, rule: TierRule) -> Self {
        self.rules.insert(level, rule);
        self
    }

    pub fn rule_for(&self, level: Level) -> TierRule {
        // 构造时已为每个等级填充规则
        self.rules
            .get(&level)
            .copied()
            .unwrap_or_else(|| TierRule::new(1, Duration::from_secs(1)))
    }
}

/// tier 缓存条目，key 为 workspace credential
///
/// 外部激活/登录流程以 JSON 写入：`{"userLevel": 1, "quota": 500}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCacheEntry {
    #[serde(rename = "userLevel")]
    pub level: Level,
    pub quota: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_are_totally_ordered() {
        assert!(Level::Basic < Level::Plus);
        assert!(Level::Plus < Level::Premium);
        assert!(Level::Premium < Level::Top);
        assert_eq!(Level::iter().count(), 4);
    }

    #[test]
    fn test_level_display() {
        assert_eq!(Level::Basic.to_string(), "basic");
        assert_eq!(Level::Premium.to_string(), "premium");
    }

    #[test]
    fn test_cache_entry_decodes_numeric_level() {
        let entry: TierCacheEntry =
            serde_json::from_str(r#"{"userLevel":2,"quota":300}"#).unwrap();
        assert_eq!(entry.level, Level::Premium);
        assert_eq!(entry.quota, 300);
    }

    #[test]
    fn test_cache_entry_rejects_unknown_level_and_negative_quota() {
        assert!(serde_json::from_str::<TierCacheEntry>(r#"{"userLevel":9,"quota":1}"#).is_err());
        assert!(serde_json::from_str::<TierCacheEntry>(r#"{"userLevel":0,"quota":-1}"#).is_err());
    }

    #[test]
    fn test_rules_override() {
        let rules =
            TierRules::default().with(Level::Basic, TierRule::new(2, Duration::from_secs(5)));
        assert_eq!(rules.rule_for(Level::Basic).max_requests, 2);
        assert_eq!(rules.rule_for(Level::Basic).window, Duration::from_secs(5));
        assert_eq!(rules.rule_for(Level::Plus).max_requests, 100);
    }
}
