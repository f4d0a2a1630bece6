//! 分布式锁（lock）
//!
//! 以名称标识的互斥锁，支持等待超时与持有超时（租约）。每次成功获取都会得到一个
//! 单调递增的 fencing token，释放时仅当 token 仍匹配当前持有者才会清除，
//! 因此租约过期后被他人接手的锁不会被旧持有者误删。
//!
mod inmemory;

pub use inmemory::InMemoryLockService;

use crate::error::DomainResult;
use crate::model::{CouponId, StockId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;
use ulid::Ulid;

/// 锁名称：`lock:coupon:{id}`、`lock:stock:{id}`、`lock:point:{userId}`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LockName(String);

impl LockName {
    pub fn coupon(id: CouponId) -> Self {
        Self(format!("lock:coupon:{id}"))
    }

    pub fn stock(id: StockId) -> Self {
        Self(format!("lock:stock:{id}"))
    }

    pub fn point(user_id: UserId) -> Self {
        Self(format!("lock:point:{user_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 单调递增的栅栏令牌
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FencingToken(u64);

impl FencingToken {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for FencingToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 获取锁的等待上限与持有租约
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockTimeouts {
    pub wait: Duration,
    pub hold: Duration,
}

impl Default for LockTimeouts {
    fn default() -> Self {
        Self {
            wait: Duration::from_secs(10),
            hold: Duration::from_secs(1),
        }
    }
}

/// 已持有的锁
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHandle {
    name: LockName,
    token: FencingToken,
    holder: Ulid,
    acquired_at: DateTime<Utc>,
}

impl LockHandle {
    pub fn new(name: LockName, token: FencingToken) -> Self {
        Self {
            name,
            token,
            holder: Ulid::new(),
            acquired_at: Utc::now(),
        }
    }

    pub fn name(&self) -> &LockName {
        &self.name
    }

    pub fn token(&self) -> FencingToken {
        self.token
    }

    pub fn holder(&self) -> Ulid {
        self.holder
    }

    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }
}

#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// 在 `wait` 内尝试获取锁，成功后租约持续 `hold`；超时返回 `LockAcquisitionTimeout`
    async fn try_acquire(
        &self,
        name: &LockName,
        wait: Duration,
        hold: Duration,
    ) -> DomainResult<LockHandle>;

    /// 释放锁；返回 `false` 表示租约已过期并被他人接手，本次释放未生效
    async fn release(&self, handle: &LockHandle) -> DomainResult<bool>;
}

/// 按给定顺序依次获取多把锁
///
/// 任一把获取失败时，已获取的锁按相反顺序释放后返回错误。
pub async fn acquire_all(
    service: &dyn DistributedLock,
    names: &[LockName],
    timeouts: LockTimeouts,
) -> DomainResult<Vec<LockHandle>> {
    let mut handles = Vec::with_capacity(names.len());
    for name in names {
        match service.try_acquire(name, timeouts.wait, timeouts.hold).await {
            Ok(handle) => handles.push(handle),
            Err(err) => {
                release_all(service, handles).await;
                return Err(err);
            }
        }
    }
    Ok(handles)
}

/// 按获取的相反顺序释放
pub async fn release_all(service: &dyn DistributedLock, handles: Vec<LockHandle>) {
    for handle in handles.into_iter().rev() {
        match service.release(&handle).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(
                lock = %handle.name(),
                token = %handle.token(),
                "lease expired before release"
            ),
            Err(err) => tracing::warn!(lock = %handle.name(), error = %err, "lock release failed"),
        }
    }
}
