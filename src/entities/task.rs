//! workspace（task）表，由外部 CRUD 服务维护
//!
//! `status = 1` 表示启用，`deleted_at` 非空表示软删除。

use sea_orm::entity::prelude::*;

pub const STATUS_ENABLED: i32 = 1;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "tasks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub task_key: String,
    pub status: i32,
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
