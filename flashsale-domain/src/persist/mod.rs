//! 资源存储（persist）
//!
//! 定义抢购资源的事务性读写协议：
//! - 三种读取方式（`LockMode`）：普通读、乐观读（提交时校验版本）、悲观读（行锁直到事务结束）；
//! - 暂存写入（`save`/`insert`）与提交后缓存淘汰登记（`evict_after_commit`）；
//! - 原子提交（`commit`）：全部写入生效或全部不生效；丢弃事务即回滚。
//!
//! `InMemoryStore` 为进程内实现，语义上对齐带行锁与版本列的关系型存储。
//!
mod inmemory_store;
mod transaction;

pub use inmemory_store::{DEFAULT_LOCK_WAIT, InMemoryStore, InMemoryTransaction};
pub use transaction::{CommitReceipt, LockMode, ResourceStore, Transaction};
