//! workspace key 校验的几种实现

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use sea_orm::{
    ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter,
};
use tracing::{debug, trace};

use super::quota::WorkspaceRegistry;
use super::store::TierStore;
use crate::entities::task;
use crate::errors::{IpsightError, Result};

/// 查询 tasks 表：`task_key = ? AND status = 1 AND deleted_at IS NULL`
pub struct SeaOrmWorkspaceRegistry {
    db: DatabaseConnection,
}

impl SeaOrmWorkspaceRegistry {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let mut opt = ConnectOptions::new(database_url.to_owned());
        // 内存 SQLite 每个连接是独立的库，只能保持单连接
        if database_url.contains(":memory:") {
            opt.max_connections(1).min_connections(1);
        } else {
            opt.max_connections(10).min_connections(1);
        }
        opt.connect_timeout(Duration::from_secs(8))
            .acquire_timeout(Duration::from_secs(8))
            .sqlx_logging(false);

        let db = Database::connect(opt).await.map_err(|e| {
            IpsightError::config(format!("cannot connect to workspace database: {}", e))
        })?;
        debug!("Workspace database connected");
        Ok(Self { db })
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl WorkspaceRegistry for SeaOrmWorkspaceRegistry {
    async fn is_enabled(&self, workspace_key: &str) -> Result<bool> {
        let count = task::Entity::find()
            .filter(task::Column::TaskKey.eq(workspace_key))
            .filter(task::Column::Status.eq(task::STATUS_ENABLED))
            .filter(task::Column::DeletedAt.is_null())
            .count(&self.db)
            .await?;
        trace!("Workspace key lookup matched {} row(s)", count);
        Ok(count > 0)
    }

    fn name(&self) -> &'static str {
        "database"
    }
}

/// 进程内的启用 key 集合
#[derive(Default)]
pub struct MemoryWorkspaceRegistry {
    enabled: RwLock<HashSet<String>>,
}

impl MemoryWorkspaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enabled: RwLock::new(keys.into_iter().map(Into::into).collect()),
        }
    }

    pub fn enable(&self, key: impl Into<String>) {
        self.enabled.write().insert(key.into());
    }

    pub fn disable(&self, key: &str) {
        self.enabled.write().remove(key);
    }
}

#[async_trait]
impl WorkspaceRegistry for MemoryWorkspaceRegistry {
    async fn is_enabled(&self, workspace_key: &str) -> Result<bool> {
        Ok(self.enabled.read().contains(workspace_key))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// 未配置数据库时使用：tier 缓存中存在即视为启用
pub struct TierBackedRegistry {
    tiers: Arc<dyn TierStore>,
}

impl TierBackedRegistry {
    pub fn new(tiers: Arc<dyn TierStore>) -> Self {
        Self { tiers }
    }
}

#[async_trait]
impl WorkspaceRegistry for TierBackedRegistry {
    async fn is_enabled(&self, workspace_key: &str) -> Result<bool> {
        Ok(self.tiers.get_tier(workspace_key).await?.is_some())
    }

    fn name(&self) -> &'static str {
        "tier-cache"
    }
}
