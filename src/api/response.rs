//! 统一响应包裹 `{code, msg, data}`

use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use tracing::error;

use crate::errors::IpsightError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum ResponseCode {
    Ok = 0,
    Fail = 1,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: ResponseCode,
    pub msg: String,
    pub data: Option<T>,
}

/// 构建 JSON 响应
pub fn json_response<T: Serialize>(
    status: StatusCode,
    code: ResponseCode,
    msg: impl Into<String>,
    data: Option<T>,
) -> HttpResponse {
    HttpResponse::build(status)
        .append_header(("Content-Type", "application/json; charset=utf-8"))
        .json(ApiResponse {
            code,
            msg: msg.into(),
            data,
        })
}

/// 构建成功响应
pub fn success_response<T: Serialize>(data: T) -> HttpResponse {
    json_response(StatusCode::OK, ResponseCode::Ok, "success", Some(data))
}

/// 构建错误响应，`data` 为 null
pub fn error_response(status: StatusCode, msg: &str) -> HttpResponse {
    json_response::<()>(status, ResponseCode::Fail, msg, None)
}

/// 从 IpsightError 构建错误响应
///
/// 5xx 类错误记录详细信息，对外只返回通用文案。
pub fn error_from_ipsight(err: &IpsightError) -> HttpResponse {
    let status = err.http_status();
    if status.is_server_error() {
        error!("{} {}: {}", err.code(), err.error_type(), err.message());
    }
    error_response(status, err.public_message())
}
