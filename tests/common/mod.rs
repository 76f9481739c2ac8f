//! 集成测试共用的数据源替身

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use ipsight::geo::records::{
    CityNames, ContinentData, CountryInfo, LocationData, PostalData, SubdivisionData,
};
use ipsight::geo::{AsnData, CityData, CountryData, GeoLookup, GeoSourceError};
use ipsight::geo::chain::SourceKind;

pub fn names(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn ip(s: &str) -> IpAddr {
    s.parse().expect("test address")
}

/// 可配置的内存数据源，记录调用次数与并发高水位
#[derive(Default)]
pub struct FakeSource {
    pub city: Option<HashMap<IpAddr, CityData>>,
    pub country: Option<HashMap<IpAddr, CountryData>>,
    pub asn: Option<HashMap<IpAddr, AsnData>>,
    /// 未在 asn 表中的地址也返回这个默认值
    pub default_asn: Option<AsnData>,
    pub delay: Duration,
    pub panic_on: HashSet<IpAddr>,

    pub city_calls: AtomicUsize,
    pub country_calls: AtomicUsize,
    pub asn_calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub high_water: AtomicUsize,
}

impl FakeSource {
    pub fn asn_only(number: u32, org: &str) -> Self {
        Self {
            asn: Some(HashMap::new()),
            default_asn: Some(AsnData {
                number,
                org: Some(org.to_string()),
            }),
            ..Default::default()
        }
    }

    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.city_calls.load(Ordering::SeqCst)
            + self.country_calls.load(Ordering::SeqCst)
            + self.asn_calls.load(Ordering::SeqCst)
    }

    fn enter(&self, ip: IpAddr) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.high_water.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.panic_on.contains(&ip) {
            panic!("simulated lookup failure for {}", ip);
        }
        guard
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl GeoLookup for FakeSource {
    fn has_city(&self) -> bool {
        self.city.is_some()
    }

    fn has_country(&self) -> bool {
        self.country.is_some()
    }

    fn has_asn(&self) -> bool {
        self.asn.is_some()
    }

    fn lookup_city(&self, ip: IpAddr) -> Result<CityData, GeoSourceError> {
        self.city_calls.fetch_add(1, Ordering::SeqCst);
        let _guard = self.enter(ip);
        let table = self
            .city
            .as_ref()
            .ok_or(GeoSourceError::NoDatabase(SourceKind::City))?;
        table.get(&ip).cloned().ok_or(GeoSourceError::NotFound)
    }

    fn lookup_country(&self, ip: IpAddr) -> Result<CountryData, GeoSourceError> {
        self.country_calls.fetch_add(1, Ordering::SeqCst);
        let _guard = self.enter(ip);
        let table = self
            .country
            .as_ref()
            .ok_or(GeoSourceError::NoDatabase(SourceKind::Country))?;
        table.get(&ip).cloned().ok_or(GeoSourceError::NotFound)
    }

    fn lookup_asn(&self, ip: IpAddr) -> Result<AsnData, GeoSourceError> {
        self.asn_calls.fetch_add(1, Ordering::SeqCst);
        let _guard = self.enter(ip);
        let table = self
            .asn
            .as_ref()
            .ok_or(GeoSourceError::NoDatabase(SourceKind::Asn))?;
        table
            .get(&ip)
            .cloned()
            .or_else(|| self.default_asn.clone())
            .ok_or(GeoSourceError::NotFound)
    }
}

/// 柏林的 City 记录
pub fn berlin_city(with_country: bool) -> CityData {
    CityData {
        network: Some("81.0.0.0/16".to_string()),
        continent: if with_country {
            ContinentData {
                code: Some("EU".into()),
                names: names(&[("en", "Europe"), ("de", "Europa")]),
            }
        } else {
            ContinentData::default()
        },
        country: if with_country {
            CountryInfo {
                iso_code: Some("DE".into()),
                names: names(&[("en", "Germany"), ("de", "Deutschland")]),
            }
        } else {
            CountryInfo::default()
        },
        subdivisions: vec![SubdivisionData {
            iso_code: Some("BE".into()),
            names: names(&[("en", "Land Berlin"), ("de", "Berlin")]),
        }],
        city: CityNames {
            names: names(&[("en", "Berlin"), ("ja", "ベルリン")]),
        },
        postal: PostalData {
            code: Some("10115".into()),
        },
        location: LocationData {
            latitude: Some(52.5196),
            longitude: Some(13.4069),
            accuracy_radius: Some(20),
            time_zone: Some("Europe/Berlin".into()),
        },
        traits: None,
    }
}

pub fn country_record(continent: &str, iso: &str, en_name: &str) -> CountryData {
    CountryData {
        continent: ContinentData {
            code: Some(continent.into()),
            names: names(&[("en", continent)]),
        },
        country: CountryInfo {
            iso_code: Some(iso.into()),
            names: names(&[("en", en_name)]),
        },
    }
}
