//! 缓存层（Cache Layer）
//!
//! 旁路缓存：读时先查缓存，未命中再读存储并按 TTL 回填；
//! 写路径在事务**提交成功之后**才淘汰对应键，回滚的事务不触碰缓存。
//! 缓存只是存储的建议副本，任何缓存故障都回退到存储读取。
//!
mod inmemory;
mod look_aside;

pub use inmemory::{CacheStats, InMemoryCache};
pub use look_aside::{evict_committed, read_through};

use crate::error::DomainResult;
use crate::model::{ProductId, StockId};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// 按资源划分命名空间的缓存键，如 `stock:1`、`product:7`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn stock(id: StockId) -> Self {
        Self(format!("stock:{id}"))
    }

    pub fn product(id: ProductId) -> Self {
        Self(format!("product:{id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 各类资源的缓存存活时间
///
/// 库存变动频繁取短 TTL，商品信息相对静态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtl {
    pub stock: Duration,
    pub product: Duration,
}

impl Default for CacheTtl {
    fn default() -> Self {
        Self {
            stock: Duration::from_secs(60),
            product: Duration::from_secs(10),
        }
    }
}

/// 缓存协议：值统一以 JSON 存储
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &CacheKey) -> DomainResult<Option<Value>>;

    async fn set(&self, key: &CacheKey, value: Value, ttl: Duration) -> DomainResult<()>;

    /// 删除键，返回该键此前是否存在
    async fn delete(&self, key: &CacheKey) -> DomainResult<bool>;
}
