use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::admission::{Level, TierRule, TierRules};

/// 静态配置（从 TOML 加载，启动时使用）
///
/// 包含：
/// - server: 服务器地址、端口、CPU 数量、可信代理
/// - logging: 日志配置
/// - geoip: MaxMind 数据库路径与查询并发上限
/// - cache: 限流计数器与 tier 缓存所在的共享缓存
/// - database: workspace key 校验所用数据库（可选）
/// - tiers: 各等级的限流规则
/// - api: HTTP 接口相关配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub geoip: GeoIpConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub tiers: TiersConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

impl StaticConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：ENV > config.toml > 默认值
    /// ENV 前缀：IPS，分隔符：__
    /// 示例：IPS__SERVER__PORT=9999
    pub fn load(path: Option<&str>) -> Self {
        use config::{Config, Environment, File};

        let path = path.unwrap_or("config.toml");

        let builder = Config::builder()
            // 1. 从 TOML 文件加载（可选）
            .add_source(File::with_name(path).required(false))
            // 2. 从环境变量覆盖，前缀 IPS，分隔符 __
            .add_source(
                Environment::with_prefix("IPS")
                    .separator("__")
                    .try_parsing(true),
            );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<StaticConfig>() {
                Ok(config) => {
                    if std::path::Path::new(path).exists() {
                        eprintln!("[INFO] Configuration loaded from: {}", path);
                    }
                    config
                }
                Err(e) => {
                    eprintln!("[ERROR] Failed to deserialize config: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("[ERROR] Failed to build config: {}", e);
                Self::default()
            }
        }
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config)
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_cpu_count")]
    pub cpu_count: usize,
    /// 可信代理（IP 或 CIDR），为空时自动信任私有网段的代理
    #[serde(default)]
    pub trusted_proxies: Vec<String>,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

/// GeoIP 数据源配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoIpConfig {
    /// GeoLite2-City.mmdb 路径
    #[serde(default)]
    pub city_db: Option<String>,
    /// GeoLite2-Country.mmdb 路径
    #[serde(default)]
    pub country_db: Option<String>,
    /// GeoLite2-ASN.mmdb 路径
    #[serde(default)]
    pub asn_db: Option<String>,
    /// 同时进行中的查询上限
    #[serde(default = "default_geoip_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_lang")]
    pub default_lang: String,
}

/// 共享缓存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// "redis" 或 "memory"
    #[serde(rename = "type")]
    #[serde(default = "default_cache_type")]
    pub cache_type: String,
    #[serde(default)]
    pub redis: RedisConfig,
    /// tier 缓存 key 前缀，由外部激活/登录流程写入
    #[serde(default = "default_tier_key_prefix")]
    pub tier_key_prefix: String,
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// Redis 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// 限流计数器命名空间
    #[serde(default = "default_redis_key_prefix")]
    pub key_prefix: String,
}

/// 内存缓存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_memory_capacity")]
    pub max_capacity: u64,
}

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatabaseConfig {
    /// 未配置时，workspace key 是否有效以 tier 缓存是否存在为准
    #[serde(default)]
    pub database_url: Option<String>,
}

/// 单个等级的限流规则
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TierRuleConfig {
    pub max_requests: u64,
    pub window_secs: u64,
}

/// 各等级限流规则
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TiersConfig {
    #[serde(default = "default_basic_rule")]
    pub basic: TierRuleConfig,
    #[serde(default = "default_plus_rule")]
    pub plus: TierRuleConfig,
    #[serde(default = "default_premium_rule")]
    pub premium: TierRuleConfig,
    #[serde(default = "default_top_rule")]
    pub top: TierRuleConfig,
}

impl TiersConfig {
    pub fn to_rules(&self) -> TierRules {
        let rule = |c: &TierRuleConfig| {
            TierRule::new(c.max_requests, Duration::from_secs(c.window_secs.max(1)))
        };
        TierRules::default()
            .with(Level::Basic, rule(&self.basic))
            .with(Level::Plus, rule(&self.plus))
            .with(Level::Premium, rule(&self.premium))
            .with(Level::Top, rule(&self.top))
    }
}

/// HTTP 接口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_batch_max_body_bytes")]
    pub batch_max_body_bytes: usize,
    /// 批量解析的最长等待时间，超时后取消并返回服务错误
    #[serde(default = "default_batch_timeout_secs")]
    pub batch_timeout_secs: u64,
    /// 为空表示不开放跨域，"*" 表示任意来源
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

// ============================================================
// Default value functions
// ============================================================

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_cpu_count() -> usize {
    num_cpus::get()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

fn default_geoip_concurrency() -> usize {
    50
}

fn default_lang() -> String {
    "en".to_string()
}

fn default_cache_type() -> String {
    "redis".to_string()
}

fn default_tier_key_prefix() -> String {
    "apiKey:".to_string()
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379/".to_string()
}

fn default_redis_key_prefix() -> String {
    "ipsight:".to_string()
}

fn default_memory_capacity() -> u64 {
    100_000
}

fn default_basic_rule() -> TierRuleConfig {
    TierRuleConfig {
        max_requests: 1,
        window_secs: 1,
    }
}

fn default_plus_rule() -> TierRuleConfig {
    TierRuleConfig {
        max_requests: 100,
        window_secs: 1,
    }
}

fn default_premium_rule() -> TierRuleConfig {
    TierRuleConfig {
        max_requests: 1000,
        window_secs: 1,
    }
}

fn default_top_rule() -> TierRuleConfig {
    TierRuleConfig {
        max_requests: 5000,
        window_secs: 1,
    }
}

fn default_batch_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_batch_timeout_secs() -> u64 {
    30
}

// ============================================================
// Default implementations
// ============================================================

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            cpu_count: default_cpu_count(),
            trusted_proxies: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}

impl Default for GeoIpConfig {
    fn default() -> Self {
        Self {
            city_db: None,
            country_db: None,
            asn_db: None,
            concurrency: default_geoip_concurrency(),
            default_lang: default_lang(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_type: default_cache_type(),
            redis: RedisConfig::default(),
            tier_key_prefix: default_tier_key_prefix(),
            memory: MemoryConfig::default(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            key_prefix: default_redis_key_prefix(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_capacity: default_memory_capacity(),
        }
    }
}

impl Default for TiersConfig {
    fn default() -> Self {
        Self {
            basic: default_basic_rule(),
            plus: default_plus_rule(),
            premium: default_premium_rule(),
            top: default_top_rule(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            batch_max_body_bytes: default_batch_max_body_bytes(),
            batch_timeout_secs: default_batch_timeout_secs(),
            cors_allowed_origins: Vec::new(),
        }
    }
}
