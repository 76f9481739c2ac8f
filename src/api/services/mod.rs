pub mod health;
pub mod ip;

use actix_web::web;

use crate::api::middleware::AdmissionGuard;

/// 注册全部路由
///
/// `/health` 不经过准入；`/v1/ip` 下的接口全部经过 [`AdmissionGuard`]。
pub fn configure(guard: AdmissionGuard) -> impl Fn(&mut web::ServiceConfig) + Clone {
    move |cfg: &mut web::ServiceConfig| {
        cfg.route("/health", web::get().to(health::health_check))
            .service(
                web::scope("/v1/ip")
                    .wrap(guard.clone())
                    .route("/batch", web::post().to(ip::lookup_batch))
                    .route("/{ip}", web::get().to(ip::lookup_single)),
            );
    }
}
