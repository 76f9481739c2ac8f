//! 单条与批量 IP 查询接口

use actix_web::{HttpMessage, HttpRequest, HttpResponse, web};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::admission::Admission;
use crate::api::response::{error_from_ipsight, success_response};
use crate::api::state::AppState;
use crate::errors::{IpsightError, messages};
use crate::geo::GeoRecord;
use crate::resolver::ResolveError;

#[derive(Debug, Deserialize)]
pub struct LangQuery {
    pub lang: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    #[serde(default)]
    pub ips: Vec<String>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchResponse {
    pub quota: u64,
    pub result: Vec<GeoRecord>,
}

/// GET /v1/ip/{ip}?lang=xx
pub async fn lookup_single(
    path: web::Path<String>,
    query: web::Query<LangQuery>,
    state: web::Data<AppState>,
) -> HttpResponse {
    let ip = path.into_inner();
    let lang = state.lang_or_default(query.lang.as_deref());

    match state.resolver.resolve_one(&ip, lang).await {
        Ok(record) => success_response(record),
        Err(e) => error_from_ipsight(&e),
    }
}

/// POST /v1/ip/batch
///
/// 请求体 `{ips, lang, apiKey}`，返回 `{quota, result}`。
/// quota 校验失败时不做任何解析。
pub async fn lookup_batch(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> HttpResponse {
    match batch(&req, &body, &state).await {
        Ok(resp) => success_response(resp),
        Err(e) => error_from_ipsight(&e),
    }
}

async fn batch(
    req: &HttpRequest,
    body: &[u8],
    state: &AppState,
) -> Result<BatchResponse, IpsightError> {
    let request: BatchRequest = serde_json::from_slice(body)
        .map_err(|_| IpsightError::validation(messages::INVALID_REQUEST_BODY))?;
    if request.api_key.is_empty() {
        return Err(IpsightError::validation(messages::INVALID_REQUEST_BODY));
    }

    let admission = req
        .extensions()
        .get::<Admission>()
        .cloned()
        .ok_or_else(|| IpsightError::service_error("admission context missing"))?;
    let quota = admission
        .quota
        .ok_or_else(|| IpsightError::service_error("admission resolved without quota"))?;

    state
        .quota
        .validate(&request.api_key, request.ips.len(), quota)
        .await?;

    let lang = state.lang_or_default(request.lang.as_deref());
    let deadline = tokio::time::sleep(state.batch_timeout);

    match state.resolver.resolve_until(&request.ips, lang, deadline).await {
        Ok(result) => {
            debug!(
                "Batch of {} resolved for level {}",
                result.len(),
                admission.level
            );
            Ok(BatchResponse { quota, result })
        }
        Err(ResolveError::Cancelled) => {
            warn!(
                "Batch of {} exceeded {:?}, cancelled",
                request.ips.len(),
                state.batch_timeout
            );
            Err(IpsightError::service_error("batch resolution timed out"))
        }
    }
}
