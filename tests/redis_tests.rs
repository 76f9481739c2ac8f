//! Redis 准入存储集成测试
//!
//! 需要可用的 Redis：`REDIS_URL=redis://127.0.0.1:6379 cargo test --test redis_tests -- --ignored`

use std::time::Duration;

use redis::AsyncCommands;
use uuid::Uuid;

use ipsight::admission::{Level, RateCounter, RedisAdmissionStore, TierStore};
use ipsight::errors::IpsightError;

const TIER_PREFIX: &str = "ipsight-test:apiKey:";

fn redis_url() -> Option<String> {
    std::env::var("REDIS_URL").ok().filter(|u| !u.is_empty())
}

fn unique(name: &str) -> String {
    format!("ipsight-test:{}:{}", name, Uuid::new_v4())
}

async fn raw_connection(url: &str) -> redis::aio::MultiplexedConnection {
    redis::Client::open(url)
        .unwrap()
        .get_multiplexed_async_connection()
        .await
        .unwrap()
}

#[tokio::test]
#[ignore]
async fn test_fixed_window_counts_then_resets() {
    let Some(url) = redis_url() else {
        eprintln!("REDIS_URL not set, skipping");
        return;
    };
    let store = RedisAdmissionStore::connect(&url, TIER_PREFIX).await.unwrap();
    let key = unique("ratelimit:apikey");
    let window = Duration::from_millis(500);

    assert_eq!(store.hit(&key, window).await.unwrap(), 1);
    assert_eq!(store.hit(&key, window).await.unwrap(), 2);
    assert_eq!(store.hit(&key, window).await.unwrap(), 3);

    // 后续自增不延长过期时间
    let mut conn = raw_connection(&url).await;
    let ttl: i64 = conn.pttl(&key).await.unwrap();
    assert!(ttl > 0 && ttl <= 500, "unexpected pttl {}", ttl);

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(store.hit(&key, window).await.unwrap(), 1);

    let _: () = conn.del(&key).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_tier_entries_are_read_as_json() {
    let Some(url) = redis_url() else {
        eprintln!("REDIS_URL not set, skipping");
        return;
    };
    let store = RedisAdmissionStore::connect(&url, TIER_PREFIX).await.unwrap();
    let mut conn = raw_connection(&url).await;

    let good = Uuid::new_v4().to_string();
    let bad = Uuid::new_v4().to_string();
    let _: () = conn
        .set_ex(
            format!("{}{}", TIER_PREFIX, good),
            r#"{"userLevel":2,"quota":300}"#,
            60,
        )
        .await
        .unwrap();
    let _: () = conn
        .set_ex(
            format!("{}{}", TIER_PREFIX, bad),
            r#"{"userLevel":9,"quota":1}"#,
            60,
        )
        .await
        .unwrap();

    let entry = store.get_tier(&good).await.unwrap().unwrap();
    assert_eq!(entry.level, Level::Premium);
    assert_eq!(entry.quota, 300);

    assert!(store.get_tier("missing-credential").await.unwrap().is_none());
    assert!(matches!(
        store.get_tier(&bad).await,
        Err(IpsightError::ServiceError(_))
    ));
}

#[tokio::test]
async fn test_connect_rejects_malformed_url() {
    let result = RedisAdmissionStore::connect("not a url", TIER_PREFIX).await;
    assert!(matches!(result, Err(IpsightError::Config(_))));
}
