//! Server mode
//!
//! 组装 HTTP 服务并等待退出信号。

use actix_cors::Cors;
use actix_web::{
    App, HttpServer,
    http::{Method, header},
    middleware::{Compress, DefaultHeaders},
    web,
};
use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::api::middleware::{AccessLogMiddleware, AdmissionGuard, RequestIdMiddleware};
use crate::api::services::configure;
use crate::config::{ApiConfig, get_config};
use crate::runtime::lifetime;

/// 根据 `api.cors_allowed_origins` 构建 CORS
///
/// 为空时不开放跨域；包含 `"*"` 时允许任意来源（不支持携带凭据）。
pub fn build_cors(api: &ApiConfig) -> Cors {
    if api.cors_allowed_origins.is_empty() {
        return Cors::default();
    }

    let cors = if api.cors_allowed_origins.iter().any(|o| o == "*") {
        Cors::default().allow_any_origin()
    } else {
        api.cors_allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
    };

    cors.allowed_methods([Method::GET, Method::POST])
        .allowed_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allowed_header("x-request-id")
        .expose_headers(["x-request-id"])
        .max_age(3600)
}

/// 运行 HTTP 服务
///
/// 日志系统必须在调用前初始化。
pub async fn run_server() -> Result<()> {
    let config = get_config();
    let startup = lifetime::startup::prepare_server_startup(&config)
        .await
        .inspect_err(|e| tracing::error!("Server startup failed: {:#}", e))?;

    let chain = startup.chain.clone();
    let state = web::Data::from(startup.state.clone());
    let guard = AdmissionGuard::new(startup.gate.clone(), startup.proxies.clone());
    let routes = configure(guard);
    let api_config = config.api.clone();

    let cpu_count = config.server.cpu_count.clamp(1, 32);
    info!("Using {} CPU cores for the server", cpu_count);

    let bind_address = format!("{}:{}", config.server.host, config.server.port);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(AccessLogMiddleware)
            .wrap(RequestIdMiddleware)
            .wrap(build_cors(&api_config))
            .wrap(Compress::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("Cache-Control", "no-cache, no-store, must-revalidate")),
            )
            .app_data(state.clone())
            .app_data(web::PayloadConfig::new(api_config.batch_max_body_bytes))
            .configure(routes.clone())
    })
    .keep_alive(std::time::Duration::from_secs(30))
    .client_request_timeout(std::time::Duration::from_millis(5000))
    .client_disconnect_timeout(std::time::Duration::from_millis(1000))
    .workers(cpu_count)
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?
    .disable_signals()
    .run();

    warn!("Starting server at http://{}", bind_address);
    let handle = server.handle();

    tokio::select! {
        res = server => {
            res.context("HTTP server terminated with error")?;
        }
        _ = lifetime::shutdown::wait_for_signal() => {
            handle.stop(true).await;
            warn!("HTTP server stopped");
        }
    }

    lifetime::shutdown::close_sources(chain).await;
    Ok(())
}
