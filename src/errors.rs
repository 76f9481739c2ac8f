use std::fmt;

use actix_web::http::StatusCode;

#[derive(Debug, Clone)]
pub enum IpsightError {
    InvalidAddress(String),
    InvalidCredential(String),
    RateLimited(String),
    QuotaExceeded(String),
    SourceUnavailable(String),
    ServiceError(String),
    Validation(String),
    Config(String),
    FileOperation(String),
}

/// 对外统一的错误文案
pub mod messages {
    pub const INVALID_IP: &str = "invalid IP";
    pub const INVALID_CREDENTIAL: &str = "invalid credential";
    pub const RATE_LIMITED: &str = "rate limited";
    pub const QUOTA_EXCEEDED: &str = "quota exceeded";
    pub const SERVICE_ERROR: &str = "service error";
    pub const INVALID_REQUEST_BODY: &str = "invalid request body";
    pub const LOOKUP_FAILED: &str = "lookup failed";
}

impl IpsightError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            IpsightError::InvalidAddress(_) => "E001",
            IpsightError::InvalidCredential(_) => "E002",
            IpsightError::RateLimited(_) => "E003",
            IpsightError::QuotaExceeded(_) => "E004",
            IpsightError::SourceUnavailable(_) => "E005",
            IpsightError::ServiceError(_) => "E006",
            IpsightError::Validation(_) => "E007",
            IpsightError::Config(_) => "E008",
            IpsightError::FileOperation(_) => "E009",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            IpsightError::InvalidAddress(_) => "Invalid Address",
            IpsightError::InvalidCredential(_) => "Invalid Credential",
            IpsightError::RateLimited(_) => "Rate Limited",
            IpsightError::QuotaExceeded(_) => "Quota Exceeded",
            IpsightError::SourceUnavailable(_) => "Source Unavailable",
            IpsightError::ServiceError(_) => "Service Error",
            IpsightError::Validation(_) => "Validation Error",
            IpsightError::Config(_) => "Configuration Error",
            IpsightError::FileOperation(_) => "File Operation Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            IpsightError::InvalidAddress(msg) => msg,
            IpsightError::InvalidCredential(msg) => msg,
            IpsightError::RateLimited(msg) => msg,
            IpsightError::QuotaExceeded(msg) => msg,
            IpsightError::SourceUnavailable(msg) => msg,
            IpsightError::ServiceError(msg) => msg,
            IpsightError::Validation(msg) => msg,
            IpsightError::Config(msg) => msg,
            IpsightError::FileOperation(msg) => msg,
        }
    }

    /// HTTP 状态码映射
    pub fn http_status(&self) -> StatusCode {
        match self {
            IpsightError::InvalidAddress(_) | IpsightError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            IpsightError::InvalidCredential(_) => StatusCode::UNAUTHORIZED,
            IpsightError::QuotaExceeded(_) => StatusCode::FORBIDDEN,
            IpsightError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            IpsightError::SourceUnavailable(_)
            | IpsightError::ServiceError(_)
            | IpsightError::Config(_)
            | IpsightError::FileOperation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 返回给调用方的文案
    ///
    /// 5xx 类错误只返回通用文案，详细信息只写日志。
    pub fn public_message(&self) -> &str {
        if self.http_status().is_server_error() {
            messages::SERVICE_ERROR
        } else {
            self.message()
        }
    }

    /// 格式化为彩色输出（用于启动失败时的终端输出）
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for IpsightError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for IpsightError {}

// 便捷的构造函数
impl IpsightError {
    pub fn invalid_address<T: Into<String>>(msg: T) -> Self {
        IpsightError::InvalidAddress(msg.into())
    }

    pub fn invalid_credential<T: Into<String>>(msg: T) -> Self {
        IpsightError::InvalidCredential(msg.into())
    }

    pub fn rate_limited<T: Into<String>>(msg: T) -> Self {
        IpsightError::RateLimited(msg.into())
    }

    pub fn quota_exceeded<T: Into<String>>(msg: T) -> Self {
        IpsightError::QuotaExceeded(msg.into())
    }

    pub fn source_unavailable<T: Into<String>>(msg: T) -> Self {
        IpsightError::SourceUnavailable(msg.into())
    }

    pub fn service_error<T: Into<String>>(msg: T) -> Self {
        IpsightError::ServiceError(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        IpsightError::Validation(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        IpsightError::Config(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        IpsightError::FileOperation(msg.into())
    }
}

// 为常见的错误类型实现 From trait
impl From<redis::RedisError> for IpsightError {
    fn from(err: redis::RedisError) -> Self {
        IpsightError::ServiceError(format!("redis: {}", err))
    }
}

impl From<sea_orm::DbErr> for IpsightError {
    fn from(err: sea_orm::DbErr) -> Self {
        IpsightError::ServiceError(format!("database: {}", err))
    }
}

impl From<serde_json::Error> for IpsightError {
    fn from(err: serde_json::Error) -> Self {
        IpsightError::ServiceError(format!("deserialize: {}", err))
    }
}

impl From<std::io::Error> for IpsightError {
    fn from(err: std::io::Error) -> Self {
        IpsightError::FileOperation(err.to_string())
    }
}

impl From<maxminddb::MaxMindDbError> for IpsightError {
    fn from(err: maxminddb::MaxMindDbError) -> Self {
        IpsightError::SourceUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IpsightError>;
