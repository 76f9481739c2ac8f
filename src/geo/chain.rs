//! GeoLite2 数据源链
//!
//! 持有 0～3 个只读 MaxMind 数据库句柄（City、Country、ASN）。
//! 查询只取读锁，可无限并发；`close` 与 `reload` 取写锁。

use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;

use maxminddb::Reader;
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, trace};

use super::records::{AsnData, CityData, CountryData};
use crate::config::GeoIpConfig;
use crate::errors::IpsightError;

/// 单个数据源的查询错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeoSourceError {
    /// 数据源未配置、打开失败或链已关闭
    NoDatabase(SourceKind),
    /// 地址不在数据库覆盖范围内
    NotFound,
    /// 数据库内容无法解码
    Decode(String),
}

impl fmt::Display for GeoSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeoSourceError::NoDatabase(kind) => write!(f, "no {} database loaded", kind),
            GeoSourceError::NotFound => f.write_str("record not found"),
            GeoSourceError::Decode(msg) => write!(f, "decode failed: {}", msg),
        }
    }
}

impl std::error::Error for GeoSourceError {}

impl From<GeoSourceError> for IpsightError {
    fn from(err: GeoSourceError) -> Self {
        IpsightError::source_unavailable(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    City,
    Country,
    Asn,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceKind::City => "city",
            SourceKind::Country => "country",
            SourceKind::Asn => "asn",
        })
    }
}

/// 按优先级查询的数据源接口
///
/// 所有方法都是同步的本地读，调用方可以在任意多个线程上并发调用。
pub trait GeoLookup: Send + Sync {
    fn has_city(&self) -> bool;
    fn has_country(&self) -> bool;
    fn has_asn(&self) -> bool;

    fn lookup_city(&self, ip: IpAddr) -> Result<CityData, GeoSourceError>;
    fn lookup_country(&self, ip: IpAddr) -> Result<CountryData, GeoSourceError>;
    fn lookup_asn(&self, ip: IpAddr) -> Result<AsnData, GeoSourceError>;

    fn availability(&self) -> SourceAvailability {
        SourceAvailability {
            city: self.has_city(),
            country: self.has_country(),
            asn: self.has_asn(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceAvailability {
    pub city: bool,
    pub country: bool,
    pub asn: bool,
}

/// 各数据库文件路径，未配置的数据源为 `None`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeoSourcePaths {
    pub city: Option<PathBuf>,
    pub country: Option<PathBuf>,
    pub asn: Option<PathBuf>,
}

impl GeoSourcePaths {
    pub fn from_config(config: &GeoIpConfig) -> Self {
        let path = |p: &Option<String>| {
            p.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
        };
        Self {
            city: path(&config.city_db),
            country: path(&config.country_db),
            asn: path(&config.asn_db),
        }
    }
}

type Handle = Reader<Vec<u8>>;

#[derive(Default)]
struct SourceSet {
    city: Option<Handle>,
    country: Option<Handle>,
    asn: Option<Handle>,
}

impl SourceSet {
    /// 逐个打开已配置的数据库，返回打开成功的集合与失败列表
    fn open(paths: &GeoSourcePaths) -> (Self, Vec<(SourceKind, String)>) {
        let mut failures = Vec::new();
        let mut open_one = |kind: SourceKind, path: &Option<PathBuf>| -> Option<Handle> {
            let path = path.as_ref()?;
            match Reader::open_readfile(path) {
                Ok(reader) => {
                    debug!("Opened {} database: {}", kind, path.display());
                    Some(reader)
                }
                Err(e) => {
                    failures.push((kind, format!("{}: {}", path.display(), e)));
                    None
                }
            }
        };

        let set = SourceSet {
            city: open_one(SourceKind::City, &paths.city),
            country: open_one(SourceKind::Country, &paths.country),
            asn: open_one(SourceKind::Asn, &paths.asn),
        };
        (set, failures)
    }

    fn availability(&self) -> SourceAvailability {
        SourceAvailability {
            city: self.city.is_some(),
            country: self.country.is_some(),
            asn: self.asn.is_some(),
        }
    }
}

struct ChainState {
    sources: SourceSet,
    closed: bool,
}

pub struct GeoSourceChain {
    state: RwLock<ChainState>,
}

impl GeoSourceChain {
    /// 打开已配置的数据库
    ///
    /// 单个数据库打开失败只记录错误并视为不可用，不影响其余数据源。
    pub fn open(paths: &GeoSourcePaths) -> Self {
        let (sources, failures) = SourceSet::open(paths);
        for (kind, reason) in &failures {
            error!("GeoIP {} database unavailable: {}", kind, reason);
        }
        let availability = sources.availability();
        info!(
            "GeoIP sources: city={}, country={}, asn={}",
            availability.city, availability.country, availability.asn
        );
        Self {
            state: RwLock::new(ChainState {
                sources,
                closed: false,
            }),
        }
    }

    /// 不含任何数据源的空链
    pub fn empty() -> Self {
        Self::open(&GeoSourcePaths::default())
    }

    pub fn is_closed(&self) -> bool {
        self.state.read().closed
    }

    /// 释放所有句柄，可重复调用
    ///
    /// 关闭后的查询返回 `NoDatabase`。
    pub fn close(&self) {
        let mut state = self.state.write();
        if state.closed {
            return;
        }
        state.closed = true;
        state.sources = SourceSet::default();
        info!("GeoIP source chain closed");
    }

    /// 重新打开数据库并整体替换
    ///
    /// 任一已配置的数据库打开失败时保留旧句柄继续服务。
    pub fn reload(&self, paths: &GeoSourcePaths) -> Result<SourceAvailability, IpsightError> {
        let (sources, failures) = SourceSet::open(paths);
        if !failures.is_empty() {
            let detail = failures
                .iter()
                .map(|(kind, reason)| format!("{}: {}", kind, reason))
                .collect::<Vec<_>>()
                .join("; ");
            error!("GeoIP reload aborted, keeping current sources: {}", detail);
            return Err(IpsightError::source_unavailable(detail));
        }

        let availability = sources.availability();
        let mut state = self.state.write();
        if state.closed {
            return Err(IpsightError::source_unavailable("source chain is closed"));
        }
        state.sources = sources;
        info!(
            "GeoIP sources reloaded: city={}, country={}, asn={}",
            availability.city, availability.country, availability.asn
        );
        Ok(availability)
    }

    fn lookup_with<T, F>(
        &self,
        kind: SourceKind,
        ip: IpAddr,
        pick: F,
    ) -> Result<(T, Option<String>), GeoSourceError>
    where
        T: DeserializeOwned,
        F: Fn(&SourceSet) -> Option<&Handle>,
    {
        let state = self.state.read();
        if state.closed {
            return Err(GeoSourceError::NoDatabase(kind));
        }
        let reader = pick(&state.sources).ok_or(GeoSourceError::NoDatabase(kind))?;

        let result = reader
            .lookup(ip)
            .map_err(|e| GeoSourceError::Decode(e.to_string()))?;
        if !result.has_data() {
            trace!("{} lookup miss for {}", kind, ip);
            return Err(GeoSourceError::NotFound);
        }

        let network = result.network().ok().map(|n| n.to_string());
        let data = result
            .decode::<T>()
            .map_err(|e| GeoSourceError::Decode(e.to_string()))?
            .ok_or(GeoSourceError::NotFound)?;
        Ok((data, network))
    }
}

impl GeoLookup for GeoSourceChain {
    fn has_city(&self) -> bool {
        let state = self.state.read();
        !state.closed && state.sources.city.is_some()
    }

    fn has_country(&self) -> bool {
        let state = self.state.read();
        !state.closed && state.sources.country.is_some()
    }

    fn has_asn(&self) -> bool {
        let state = self.state.read();
        !state.closed && state.sources.asn.is_some()
    }

    fn lookup_city(&self, ip: IpAddr) -> Result<CityData, GeoSourceError> {
        let (mut data, network): (CityData, _) =
            self.lookup_with(SourceKind::City, ip, |s| s.city.as_ref())?;
        data.network = network;
        Ok(data)
    }

    fn lookup_country(&self, ip: IpAddr) -> Result<CountryData, GeoSourceError> {
        self.lookup_with(SourceKind::Country, ip, |s| s.country.as_ref())
            .map(|(data, _)| data)
    }

    fn lookup_asn(&self, ip: IpAddr) -> Result<AsnData, GeoSourceError> {
        self.lookup_with(SourceKind::Asn, ip, |s| s.asn.as_ref())
            .map(|(data, _)| data)
    }
}
