use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::geo::GeoSourceChain;

/// 关闭超时时间（秒）
const SHUTDOWN_TIMEOUT_SECS: u64 = 10;

/// 等待 Ctrl+C
pub async fn wait_for_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => warn!(
            "Failed to listen for Ctrl+C: {}. Proceeding with shutdown anyway.",
            e
        ),
    }
}

/// 释放数据源句柄
///
/// 关闭需要等待进行中的查询释放读锁，因此放到阻塞线程池并设置超时。
pub async fn close_sources(chain: Arc<GeoSourceChain>) {
    let closing = tokio::task::spawn_blocking(move || chain.close());
    match timeout(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS), closing).await {
        Ok(Ok(())) => info!("GeoIP sources released"),
        Ok(Err(e)) => error!("Closing GeoIP sources failed: {}", e),
        Err(_) => error!(
            "Closing GeoIP sources timed out after {} seconds",
            SHUTDOWN_TIMEOUT_SECS
        ),
    }
}
