//! 内存版分布式锁（InMemoryLockService）
//!
//! 租约表由同步互斥量保护，获取与比较后清除都在同一临界区内完成。
//! 等待者在释放通知与“最早可能过期时刻”两者之间择先醒来重试。
//!
use super::{DistributedLock, FencingToken, LockHandle, LockName};
use crate::error::{DomainError, DomainResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

struct Lease {
    token: FencingToken,
    expires_at: Instant,
}

#[derive(Default)]
pub struct InMemoryLockService {
    leases: Mutex<HashMap<LockName, Lease>>,
    released: Notify,
    last_token: AtomicU64,
}

impl InMemoryLockService {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前是否有未过期的持有者
    pub fn is_held(&self, name: &LockName) -> bool {
        self.leases
            .lock()
            .get(name)
            .is_some_and(|lease| lease.expires_at > Instant::now())
    }

    /// 成功返回新句柄；失败返回当前租约的过期时刻
    fn try_claim(&self, name: &LockName, hold: Duration) -> Result<LockHandle, Instant> {
        let now = Instant::now();
        let mut leases = self.leases.lock();
        if let Some(lease) = leases.get(name)
            && lease.expires_at > now
        {
            return Err(lease.expires_at);
        }

        let token = FencingToken::new(self.last_token.fetch_add(1, Ordering::SeqCst) + 1);
        leases.insert(
            name.clone(),
            Lease {
                token,
                expires_at: now + hold,
            },
        );
        Ok(LockHandle::new(name.clone(), token))
    }
}

#[async_trait]
impl DistributedLock for InMemoryLockService {
    async fn try_acquire(
        &self,
        name: &LockName,
        wait: Duration,
        hold: Duration,
    ) -> DomainResult<LockHandle> {
        let started = Instant::now();
        let deadline = started + wait;

        loop {
            // 先登记通知再尝试，避免错过两者之间发生的释放
            let notified = self.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let lease_expiry = match self.try_claim(name, hold) {
                Ok(handle) => {
                    tracing::debug!(lock = %name, token = %handle.token(), holder = %handle.holder(), "lock acquired");
                    return Ok(handle);
                }
                Err(expires_at) => expires_at,
            };

            let now = Instant::now();
            if now >= deadline {
                tracing::debug!(lock = %name, ?wait, "lock wait timed out");
                return Err(DomainError::LockAcquisitionTimeout {
                    resource: name.to_string(),
                    waited: now - started,
                });
            }

            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep_until(deadline.min(lease_expiry)) => {}
            }
        }
    }

    async fn release(&self, handle: &LockHandle) -> DomainResult<bool> {
        let released = {
            let mut leases = self.leases.lock();
            match leases.get(handle.name()) {
                Some(lease) if lease.token == handle.token() => {
                    leases.remove(handle.name());
                    true
                }
                _ => false,
            }
        };

        if released {
            tracing::debug!(lock = %handle.name(), token = %handle.token(), "lock released");
            self.released.notify_waiters();
        }
        Ok(released)
    }
}
