//! 多数据源记录合并
//!
//! City 优先填充；Country 只补 City 未给出的 continent/country；ASN 总是附加。
//! 单个数据源的查询错误在这一层被吞掉，只表现为对应字段组缺失。

use std::net::IpAddr;
use std::sync::Arc;

use tracing::trace;

use super::chain::GeoLookup;
use super::locale::pick_name;
use super::model::{
    Asn, City, Continent, Country, GeoRecord, Location, Network, Postal, Region, Traits,
};
use super::records::{CityData, ContinentData, CountryData, CountryInfo};

#[derive(Clone)]
pub struct RecordMerger {
    source: Arc<dyn GeoLookup>,
}

impl RecordMerger {
    pub fn new(source: Arc<dyn GeoLookup>) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &Arc<dyn GeoLookup> {
        &self.source
    }

    pub fn merge(&self, ip: IpAddr, lang: &str) -> GeoRecord {
        let mut out = GeoRecord::new(ip.to_string());
        out.network = Some(Network {
            cidr: None,
            ip_version: if ip.is_ipv4() { 4 } else { 6 },
        });

        if self.source.has_city() {
            match self.source.lookup_city(ip) {
                Ok(city) => apply_city(&mut out, city, lang),
                Err(e) => trace!("city source skipped for {}: {}", ip, e),
            }
        }

        if self.source.has_country() && needs_country_fallback(&out) {
            match self.source.lookup_country(ip) {
                Ok(country) => apply_country(&mut out, country, lang),
                Err(e) => trace!("country source skipped for {}: {}", ip, e),
            }
        }

        if self.source.has_asn() {
            match self.source.lookup_asn(ip) {
                Ok(asn) => {
                    out.asn = Some(Asn {
                        number: asn.number,
                        org: asn.org.filter(|o| !o.is_empty()),
                    })
                }
                Err(e) => trace!("asn source skipped for {}: {}", ip, e),
            }
        }

        out
    }
}

fn needs_country_fallback(out: &GeoRecord) -> bool {
    out.continent.is_none() || out.country.is_none()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn continent_from(data: ContinentData, lang: &str) -> Option<Continent> {
    let code = non_empty(data.code)?;
    Some(Continent {
        name: pick_name(&data.names, lang),
        code: Some(code),
    })
}

fn country_from(data: CountryInfo, lang: &str) -> Option<Country> {
    let iso2 = non_empty(data.iso_code)?;
    Some(Country {
        name: pick_name(&data.names, lang),
        iso2: Some(iso2),
    })
}

fn apply_city(out: &mut GeoRecord, city: CityData, lang: &str) {
    if let Some(network) = out.network.as_mut() {
        network.cidr = city.network;
    }

    out.continent = continent_from(city.continent, lang);
    out.country = country_from(city.country, lang);

    // 只取最高一级行政区
    out.region = city.subdivisions.into_iter().next().and_then(|sub| {
        let iso = non_empty(sub.iso_code);
        let name = pick_name(&sub.names, lang);
        (iso.is_some() || name.is_some()).then_some(Region { iso, name })
    });

    out.city = pick_name(&city.city.names, lang).map(|name| City { name });
    out.postal = non_empty(city.postal.code).map(|code| Postal { code });

    let loc = city.location;
    let lat = loc.latitude.unwrap_or_default();
    let lon = loc.longitude.unwrap_or_default();
    if lat != 0.0 || lon != 0.0 {
        out.location = Some(Location {
            lat,
            lon,
            accuracy_radius_km: loc.accuracy_radius,
        });
    }
    out.timezone = non_empty(loc.time_zone);

    out.traits = city.traits.map(|t| Traits {
        is_anonymous_proxy: t.is_anonymous_proxy,
        is_satellite_provider: t.is_satellite_provider,
    });
}

/// 只填充仍为空的 continent/country，不覆盖 City 已给出的值
fn apply_country(out: &mut GeoRecord, country: CountryData, lang: &str) {
    if out.continent.is_none() {
        out.continent = continent_from(country.continent, lang);
    }
    if out.country.is_none() {
        out.country = country_from(country.country, lang);
    }
}
