use actix_web::{HttpResponse, web};
use serde::Serialize;

use crate::api::response::success_response;
use crate::api::state::AppState;
use crate::geo::SourceAvailability;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub timestamp: String,
    pub uptime_secs: u64,
    pub sources: SourceAvailability,
}

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let sources = state.resolver.merger().source().availability();
    success_response(HealthStatus {
        status: "ok",
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        sources,
    })
}
