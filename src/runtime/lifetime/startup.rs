use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::admission::{self, AdmissionGate, QuotaValidator};
use crate::api::AppState;
use crate::config::StaticConfig;
use crate::geo::{GeoLookup, GeoSourceChain, GeoSourcePaths, RecordMerger};
use crate::resolver::BoundedResolver;
use crate::utils::TrustedProxies;

pub struct StartupContext {
    pub chain: Arc<GeoSourceChain>,
    pub gate: Arc<AdmissionGate>,
    pub state: Arc<AppState>,
    pub proxies: TrustedProxies,
}

/// 准备服务器启动所需的全部组件
///
/// 数据源缺失只记录警告；共享缓存或数据库连接失败则启动失败。
pub async fn prepare_server_startup(config: &StaticConfig) -> Result<StartupContext> {
    let start_time = Instant::now();
    debug!("Starting pre-startup processing...");

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|e| anyhow::anyhow!("Failed to install rustls crypto provider: {:?}", e))?;

    let chain = Arc::new(GeoSourceChain::open(&GeoSourcePaths::from_config(
        &config.geoip,
    )));
    let availability = chain.availability();
    if !availability.city && !availability.country && !availability.asn {
        warn!("No GeoIP database available; lookups will only report network info");
    }

    let store = admission::build_store(config)
        .await
        .context("Failed to initialize admission store")?;
    let registry = admission::build_registry(config, Arc::clone(&store))
        .await
        .context("Failed to initialize workspace registry")?;

    let gate = Arc::new(AdmissionGate::new(
        store,
        config.tiers.to_rules(),
        config.cache.redis.key_prefix.clone(),
    ));

    let source: Arc<dyn GeoLookup> = chain.clone();
    let resolver = BoundedResolver::new(RecordMerger::new(source), config.geoip.concurrency);
    info!("Resolver concurrency ceiling: {}", resolver.concurrency());

    let state = AppState::new(
        resolver,
        QuotaValidator::new(registry),
        config.geoip.default_lang.clone(),
        Duration::from_secs(config.api.batch_timeout_secs.max(1)),
    );

    let proxies = TrustedProxies::new(&config.server.trusted_proxies);
    if proxies.is_empty() {
        warn!(
            "Client address auto-detect mode: private peers may set X-Forwarded-For. \
             Configure server.trusted_proxies to restrict this."
        );
    }

    info!("Pre-startup completed in {} ms", start_time.elapsed().as_millis());

    Ok(StartupContext {
        chain,
        gate,
        state,
        proxies,
    })
}
