pub mod access_log;
pub mod admission;
pub mod request_id;

pub use access_log::AccessLogMiddleware;
pub use admission::AdmissionGuard;
pub use request_id::{RequestId, RequestIdMiddleware};
