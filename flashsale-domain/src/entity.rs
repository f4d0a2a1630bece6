//! 实体（Entity）基础抽象
//!
//! 为资源实体提供统一的标识（Id）与版本（乐观锁）能力。
//! 通常由 `#[entity]` 宏生成实现。
//!
use crate::value_object::Version;
use std::fmt::{Debug, Display};
use std::hash::Hash;

/// 具备唯一标识与版本的实体抽象
pub trait Entity: Send + Sync {
    /// 实体标识类型
    type Id: Clone + Eq + Hash + Display + Debug + Send + Sync + 'static;

    /// 获取实体标识
    fn id(&self) -> &Self::Id;

    /// 获取当前版本（仅用于检测丢失更新，不具备业务含义）
    fn version(&self) -> Version;

    /// 由存储在提交时写入新版本
    fn set_version(&mut self, version: Version);
}
