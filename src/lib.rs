//! ipsight - IP intelligence service
//!
//! 面向分级客户端提供单条与批量 IP 地理信息查询，由准入层（等级、限流、quota）把关，
//! 查询落在本地 MaxMind GeoLite2 数据库组成的优先级数据源链上。
//!
//! # Architecture
//! - `geo`: 数据源链、记录合并与多语言名称选择
//! - `resolver`: 有界并发的批量解析
//! - `admission`: tier 缓存、固定窗口限流与 quota 校验
//! - `api`: HTTP 接口与中间件
//! - `config`: 配置管理
//! - `runtime`: 启动、运行与关闭
//! - `system`: 日志等系统设施

pub mod admission;
pub mod api;
pub mod config;
pub mod entities;
pub mod errors;
pub mod geo;
pub mod resolver;
pub mod runtime;
pub mod system;
pub mod utils;
