//! 批量请求的 quota 校验

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::errors::{IpsightError, Result, messages};

/// workspace key 是否存在且处于启用状态
#[async_trait]
pub trait WorkspaceRegistry: Send + Sync {
    async fn is_enabled(&self, workspace_key: &str) -> Result<bool>;

    fn name(&self) -> &'static str;
}

pub struct QuotaValidator {
    registry: Arc<dyn WorkspaceRegistry>,
}

impl QuotaValidator {
    pub fn new(registry: Arc<dyn WorkspaceRegistry>) -> Self {
        Self { registry }
    }

    /// 先确认 workspace key 有效，再比较批量大小与 quota
    ///
    /// 任何一步失败都发生在解析工作开始之前。
    pub async fn validate(&self, credential: &str, requested: usize, quota: u64) -> Result<()> {
        let enabled = self.registry.is_enabled(credential).await.map_err(|e| {
            error!("Workspace registry {} failed: {}", self.registry.name(), e);
            IpsightError::service_error(e.message())
        })?;

        if !enabled {
            debug!("Workspace key missing or disabled");
            return Err(IpsightError::invalid_credential(messages::INVALID_CREDENTIAL));
        }

        if requested as u64 > quota {
            debug!("Batch of {} exceeds quota {}", requested, quota);
            return Err(IpsightError::quota_exceeded(messages::QUOTA_EXCEEDED));
        }

        Ok(())
    }
}
