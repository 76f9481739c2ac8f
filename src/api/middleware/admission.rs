//! 准入中间件
//!
//! 从 JSON 请求体中读取 `apiKey`（若有），读取后把请求体放回供 handler 使用；
//! 随后执行 tier 解析与限流，成功时把 [`Admission`] 放入 request extensions。

use actix_service::{Service, Transform};
use actix_web::{
    Error, HttpMessage,
    body::EitherBody,
    dev::{Payload, ServiceRequest, ServiceResponse},
    error::PayloadError,
    http::Method,
    web,
};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use futures_util::{Stream, stream};
use serde::Deserialize;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, info};

use crate::admission::{Admission, AdmissionGate};
use crate::api::response::error_from_ipsight;
use crate::errors::{IpsightError, messages};
use crate::utils::TrustedProxies;

type ReplayStream = Pin<Box<dyn Stream<Item = Result<web::Bytes, PayloadError>>>>;

#[derive(Debug, Default, Deserialize)]
struct CredentialProbe {
    #[serde(rename = "apiKey", default)]
    api_key: Option<String>,
}

/// 准入中间件工厂
#[derive(Clone)]
pub struct AdmissionGuard {
    gate: Arc<AdmissionGate>,
    proxies: TrustedProxies,
}

impl AdmissionGuard {
    pub fn new(gate: Arc<AdmissionGate>, proxies: TrustedProxies) -> Self {
        Self { gate, proxies }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AdmissionGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AdmissionGuardMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AdmissionGuardMiddleware {
            service: Rc::new(service),
            gate: Arc::clone(&self.gate),
            proxies: self.proxies.clone(),
        }))
    }
}

pub struct AdmissionGuardMiddleware<S> {
    service: Rc<S>,
    gate: Arc<AdmissionGate>,
    proxies: TrustedProxies,
}

impl<S, B> AdmissionGuardMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    /// 读取请求体中的 credential 并恢复 payload
    ///
    /// 非 POST 请求不读取请求体；空请求体视为未提供 credential。
    async fn take_credential(req: &mut ServiceRequest) -> Result<Option<String>, IpsightError> {
        if req.method() != Method::POST {
            return Ok(None);
        }

        let body = req.extract::<web::Bytes>().await.map_err(|e| {
            debug!("Failed to read request body: {}", e);
            IpsightError::validation(messages::INVALID_REQUEST_BODY)
        })?;

        let chunk = body.clone();
        let replay: ReplayStream =
            Box::pin(stream::once(async move { Ok::<_, PayloadError>(chunk) }));
        req.set_payload(Payload::Stream { payload: replay });

        if body.is_empty() {
            return Ok(None);
        }

        let probe: CredentialProbe = serde_json::from_slice(&body).map_err(|e| {
            debug!("Request body is not valid JSON: {}", e);
            IpsightError::validation(messages::INVALID_REQUEST_BODY)
        })?;

        Ok(probe.api_key.filter(|k| !k.is_empty()))
    }

    fn reject(req: ServiceRequest, err: &IpsightError) -> ServiceResponse<EitherBody<B>> {
        info!("Admission rejected: {}", err.format_simple());
        req.into_response(error_from_ipsight(err).map_into_right_body())
    }
}

impl<S, B> Service<ServiceRequest> for AdmissionGuardMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let srv = self.service.clone();
        let gate = Arc::clone(&self.gate);
        let proxies = self.proxies.clone();

        Box::pin(async move {
            // CORS 预检不计数
            if req.method() == Method::OPTIONS {
                return srv.call(req).await.map(ServiceResponse::map_into_left_body);
            }

            let credential = match Self::take_credential(&mut req).await {
                Ok(c) => c,
                Err(e) => return Ok(Self::reject(req, &e)),
            };

            let client_addr = {
                let info = req.connection_info();
                proxies
                    .client_ip(info.peer_addr(), req.headers())
                    .unwrap_or_else(|| "unknown".to_string())
            };

            match gate.admit(credential.as_deref(), &client_addr).await {
                Ok(admission) => {
                    req.extensions_mut().insert::<Admission>(admission);
                    srv.call(req).await.map(ServiceResponse::map_into_left_body)
                }
                Err(e) => Ok(Self::reject(req, &e)),
            }
        })
    }
}
