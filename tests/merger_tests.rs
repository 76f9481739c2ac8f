//! RecordMerger 集成测试：优先级与补全

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use ipsight::geo::model::{Asn, Country, Postal, Region};
use ipsight::geo::records::TraitsData;
use ipsight::geo::{AsnData, RecordMerger};

use common::{FakeSource, berlin_city, country_record, ip};

#[test]
fn test_city_country_wins_over_country_source() {
    let addr = ip("81.0.0.1");
    let source = Arc::new(FakeSource {
        city: Some(HashMap::from([(addr, berlin_city(true))])),
        country: Some(HashMap::from([(addr, country_record("EU", "FR", "France"))])),
        ..Default::default()
    });
    let merger = RecordMerger::new(source.clone());

    let rec = merger.merge(addr, "en");
    assert_eq!(
        rec.country,
        Some(Country {
            iso2: Some("DE".into()),
            name: Some("Germany".into()),
        })
    );
    // city 已给出 continent 与 country，不再查询 country 源
    assert_eq!(source.country_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_country_source_fills_gap_without_touching_city_fields() {
    let addr = ip("81.0.0.2");
    let source = Arc::new(FakeSource {
        city: Some(HashMap::from([(addr, berlin_city(false))])),
        country: Some(HashMap::from([(addr, country_record("EU", "DE", "Germany"))])),
        ..Default::default()
    });
    let merger = RecordMerger::new(source.clone());

    let rec = merger.merge(addr, "en");
    assert_eq!(rec.country.as_ref().and_then(|c| c.iso2.as_deref()), Some("DE"));
    assert_eq!(rec.continent.as_ref().and_then(|c| c.code.as_deref()), Some("EU"));
    assert_eq!(
        rec.region,
        Some(Region {
            iso: Some("BE".into()),
            name: Some("Land Berlin".into()),
        })
    );
    assert_eq!(rec.postal, Some(Postal { code: "10115".into() }));
    assert_eq!(rec.city.as_ref().map(|c| c.name.as_str()), Some("Berlin"));
    assert_eq!(rec.timezone.as_deref(), Some("Europe/Berlin"));
    assert_eq!(source.country_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_country_only_when_city_misses() {
    let covered = ip("81.0.0.3");
    let uncovered = ip("203.0.113.7");
    let source = Arc::new(FakeSource {
        city: Some(HashMap::from([(covered, berlin_city(true))])),
        country: Some(HashMap::from([(uncovered, country_record("OC", "AU", "Australia"))])),
        ..Default::default()
    });
    let merger = RecordMerger::new(source);

    let rec = merger.merge(uncovered, "en");
    assert_eq!(rec.country.as_ref().and_then(|c| c.iso2.as_deref()), Some("AU"));
    assert!(rec.city.is_none());
    assert!(rec.region.is_none());
    assert!(rec.location.is_none());
    assert!(rec.network.as_ref().unwrap().cidr.is_none());
}

#[test]
fn test_city_fields_and_network() {
    let addr = ip("81.0.0.4");
    let mut city = berlin_city(true);
    city.traits = Some(TraitsData {
        is_anonymous_proxy: true,
        is_satellite_provider: false,
    });
    let source = Arc::new(FakeSource {
        city: Some(HashMap::from([(addr, city)])),
        ..Default::default()
    });
    let merger = RecordMerger::new(source);

    let rec = merger.merge(addr, "ja");
    let network = rec.network.as_ref().unwrap();
    assert_eq!(network.ip_version, 4);
    assert_eq!(network.cidr.as_deref(), Some("81.0.0.0/16"));
    // ja 存在时取 ja，否则回退到 en
    assert_eq!(rec.city.as_ref().map(|c| c.name.as_str()), Some("ベルリン"));
    assert_eq!(rec.country.as_ref().and_then(|c| c.name.as_deref()), Some("Germany"));
    let loc = rec.location.as_ref().unwrap();
    assert_eq!(loc.accuracy_radius_km, Some(20));
    assert!(rec.traits.as_ref().unwrap().is_anonymous_proxy);
}

#[test]
fn test_requested_locale_falls_back_to_english_then_any() {
    let addr = ip("81.0.0.5");
    let mut city = berlin_city(true);
    city.country.names = common::names(&[("de", "Deutschland")]);
    let source = Arc::new(FakeSource {
        city: Some(HashMap::from([(addr, city)])),
        ..Default::default()
    });
    let merger = RecordMerger::new(source);

    let rec = merger.merge(addr, "fr");
    assert_eq!(rec.continent.as_ref().and_then(|c| c.name.as_deref()), Some("Europe"));
    assert_eq!(rec.country.as_ref().and_then(|c| c.name.as_deref()), Some("Deutschland"));
}

#[test]
fn test_asn_is_attached_alongside_city() {
    let addr = ip("81.0.0.6");
    let source = Arc::new(FakeSource {
        city: Some(HashMap::from([(addr, berlin_city(true))])),
        asn: Some(HashMap::from([(
            addr,
            AsnData {
                number: 3320,
                org: Some("Deutsche Telekom AG".into()),
            },
        )])),
        ..Default::default()
    });
    let merger = RecordMerger::new(source);

    let rec = merger.merge(addr, "en");
    assert_eq!(
        rec.asn,
        Some(Asn {
            number: 3320,
            org: Some("Deutsche Telekom AG".into()),
        })
    );
    assert!(rec.country.is_some());
}

#[test]
fn test_all_sources_miss_yields_network_only() {
    let source = Arc::new(FakeSource {
        city: Some(HashMap::new()),
        country: Some(HashMap::new()),
        asn: Some(HashMap::new()),
        ..Default::default()
    });
    let merger = RecordMerger::new(source.clone());

    let rec = merger.merge(ip("2001:db8::1"), "en");
    assert!(rec.error.is_none());
    assert_eq!(rec.network.as_ref().map(|n| n.ip_version), Some(6));
    assert!(rec.country.is_none());
    assert!(rec.asn.is_none());
    assert_eq!(source.total_calls(), 3);
}
