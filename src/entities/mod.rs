//! 只读访问的外部表

pub mod task;

pub use task::Entity as Task;
