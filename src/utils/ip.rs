//! 客户端地址提取
//!
//! 仅当连接来自可信代理时才采用 X-Forwarded-For / X-Real-IP；
//! 未配置可信代理时，来自私有网段或本机的连接视为反向代理。

use std::net::{IpAddr, SocketAddr};

use actix_web::http::header::HeaderMap;
use tracing::{debug, warn};

/// 检查 IP 是否为私有地址或 localhost
pub fn is_private_or_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback(),
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || (v6.segments()[0] & 0xfe00) == 0xfc00 // fc00::/7
                || (v6.segments()[0] & 0xffc0) == 0xfe80 // fe80::/10
        }
    }
}

/// 解析 `ip` 或 `ip:port`
pub fn parse_peer(addr: &str) -> Option<IpAddr> {
    addr.parse::<SocketAddr>()
        .map(|s| s.ip())
        .or_else(|_| addr.parse::<IpAddr>())
        .ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProxyRule {
    Single(IpAddr),
    Cidr(IpAddr, u8),
}

impl ProxyRule {
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        match raw.split_once('/') {
            Some((network, prefix)) => {
                let network: IpAddr = network.parse().ok()?;
                let prefix: u8 = prefix.parse().ok()?;
                let max = if network.is_ipv4() { 32 } else { 128 };
                (prefix <= max).then_some(ProxyRule::Cidr(network, prefix))
            }
            None => raw.parse().ok().map(ProxyRule::Single),
        }
    }

    fn matches(&self, ip: &IpAddr) -> bool {
        match *self {
            ProxyRule::Single(addr) => addr == *ip,
            ProxyRule::Cidr(network, prefix) => ip_in_network(ip, &network, prefix),
        }
    }
}

/// 前缀匹配，IPv4 与 IPv6 之间不匹配；超出地址位数的前缀长度视为不匹配
pub fn ip_in_network(ip: &IpAddr, network: &IpAddr, prefix_len: u8) -> bool {
    match (ip, network) {
        (IpAddr::V4(_), IpAddr::V4(_)) if prefix_len > 32 => false,
        (IpAddr::V6(_), IpAddr::V6(_)) if prefix_len > 128 => false,
        (IpAddr::V4(ip), IpAddr::V4(net)) => {
            let mask = u32::MAX.checked_shl(32 - prefix_len as u32).unwrap_or(0);
            (u32::from(*ip) & mask) == (u32::from(*net) & mask)
        }
        (IpAddr::V6(ip), IpAddr::V6(net)) => {
            let mask = u128::MAX.checked_shl(128 - prefix_len as u32).unwrap_or(0);
            (u128::from(*ip) & mask) == (u128::from(*net) & mask)
        }
        _ => false,
    }
}

/// 可信代理列表
#[derive(Debug, Clone, Default)]
pub struct TrustedProxies {
    rules: Vec<ProxyRule>,
}

impl TrustedProxies {
    /// 无法解析的条目记录警告后忽略
    pub fn new(entries: &[String]) -> Self {
        let rules = entries
            .iter()
            .filter_map(|entry| {
                let rule = ProxyRule::parse(entry);
                if rule.is_none() {
                    warn!("Ignoring invalid trusted proxy entry: '{}'", entry);
                }
                rule
            })
            .collect();
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn is_trusted(&self, peer: &IpAddr) -> bool {
        self.rules.iter().any(|rule| rule.matches(peer))
    }

    /// 计算真实客户端地址
    ///
    /// 1. 显式配置了可信代理：peer 命中时采用转发头，否则使用 peer
    /// 2. 未配置：peer 为私有/本机地址时采用转发头
    /// 3. 其余情况使用 peer，防止伪造
    ///
    /// 转发头中的值必须是合法 IP，否则回退到 peer。
    pub fn client_ip(&self, peer: Option<&str>, headers: &HeaderMap) -> Option<String> {
        let peer_ip = peer.and_then(parse_peer);

        let trust_forwarded = match peer_ip {
            Some(ip) if !self.is_empty() => self.is_trusted(&ip),
            Some(ip) => is_private_or_local(&ip),
            None => false,
        };

        if trust_forwarded
            && let Some(forwarded) = forwarded_ip(headers)
        {
            debug!("Client address from proxy {:?}: {}", peer_ip, forwarded);
            return Some(forwarded.to_string());
        }

        peer_ip.map(|ip| ip.to_string())
    }
}

/// 从转发头提取原始客户端 IP（X-Forwarded-For 第一个，其次 X-Real-IP）
pub fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let first_forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| parse_peer(s.trim()));

    first_forwarded.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| parse_peer(s.trim()))
    })
}
