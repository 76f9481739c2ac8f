//! 各数据源的解码结构
//!
//! 字段名与 GeoLite2 mmdb 中的键一致，缺失的键按默认值处理。

use std::collections::BTreeMap;

use serde::Deserialize;

/// locale → 名称
pub type LocaleNames = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ContinentData {
    pub code: Option<String>,
    pub names: LocaleNames,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CountryInfo {
    pub iso_code: Option<String>,
    pub names: LocaleNames,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SubdivisionData {
    pub iso_code: Option<String>,
    pub names: LocaleNames,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CityNames {
    pub names: LocaleNames,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PostalData {
    pub code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LocationData {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy_radius: Option<u16>,
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TraitsData {
    pub is_anonymous_proxy: bool,
    pub is_satellite_provider: bool,
}

/// City 库的一条记录
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CityData {
    /// 命中的网段，由查询结果填充而非解码得到
    #[serde(skip)]
    pub network: Option<String>,
    pub continent: ContinentData,
    pub country: CountryInfo,
    pub subdivisions: Vec<SubdivisionData>,
    pub city: CityNames,
    pub postal: PostalData,
    pub location: LocationData,
    pub traits: Option<TraitsData>,
}

/// Country 库的一条记录
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CountryData {
    pub continent: ContinentData,
    pub country: CountryInfo,
}

/// ASN 库的一条记录
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AsnData {
    #[serde(rename = "autonomous_system_number")]
    pub number: u32,
    #[serde(rename = "autonomous_system_organization", default)]
    pub org: Option<String>,
}
