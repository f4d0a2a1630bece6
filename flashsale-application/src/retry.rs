//! 乐观冲突重试（retry）
//!
//! 仅当失败为版本冲突时整单重试，其余错误立即返回。
//! 第 n 次失败后的等待为 `min(base * 2^(n-1), max)`，开启抖动时在 `[0, 该值]` 内均匀取值。
//! 达到次数上限后返回 `RetryExhausted`，携带尝试次数与最后一次冲突。
//!
use crate::error::AppError;
use flashsale_domain::error::{DomainError, DomainResult};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 含首次尝试在内的最大尝试次数
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 50,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// 第 `attempt` 次（从 1 开始）失败后的等待上限，不含抖动
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        let ceiling = self.ceiling(attempt);
        if !self.jitter || ceiling.is_zero() {
            return ceiling;
        }
        let micros = u64::try_from(ceiling.as_micros()).unwrap_or(u64::MAX);
        Duration::from_micros(rand::thread_rng().gen_range(0..=micros))
    }
}

/// 成功结果及其消耗的尝试次数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome<T> {
    pub value: T,
    pub attempts: u32,
}

/// 令牌取消时立即以 `Cancelled` 结束，丢弃进行中的操作
pub async fn cancellable<T, Fut>(token: &CancellationToken, fut: Fut) -> DomainResult<T>
where
    Fut: Future<Output = DomainResult<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(DomainError::Cancelled),
        result = fut => result,
    }
}

/// 按 `policy` 重试版本冲突
///
/// `op` 接收当前尝试序号（从 1 开始），每次调用都必须是一次完整、独立的尝试。
/// 令牌在每次尝试前与退避等待中检查；进行中的尝试自行决定在哪一步响应取消，
/// 已提交的尝试不会因取消而被丢弃。
pub async fn retry_on_conflict<T, F, Fut>(
    policy: &RetryPolicy,
    token: &CancellationToken,
    operation: &'static str,
    mut op: F,
) -> Result<RetryOutcome<T>, AppError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = DomainResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        if token.is_cancelled() {
            return Err(DomainError::Cancelled.into());
        }
        match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(operation, attempts = attempt, "succeeded after retry");
                }
                return Ok(RetryOutcome {
                    value,
                    attempts: attempt,
                });
            }
            Err(err) if err.is_retryable() => {
                if attempt >= max_attempts {
                    tracing::warn!(operation, attempts = attempt, error = %err, "retry exhausted");
                    return Err(AppError::RetryExhausted {
                        attempts: attempt,
                        last: err,
                    });
                }

                let delay = policy.backoff(attempt);
                tracing::debug!(operation, attempt, ?delay, error = %err, "version conflict, backing off");
                cancellable(token, async {
                    tokio::time::sleep(delay).await;
                    Ok(())
                })
                .await?;
            }
            Err(err) => return Err(err.into()),
        }
    }
}
