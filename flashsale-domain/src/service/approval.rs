use crate::error::DomainResult;
use crate::model::OrderRequest;
use async_trait::async_trait;
use std::time::Duration;

/// 外部支付审批
///
/// 在读取资源之后、扣减积分之前调用。悲观策略下此时行锁仍被持有，
/// 审批耗时会直接放大锁持有时间。
#[async_trait]
pub trait PaymentApproval: Send + Sync {
    async fn approve(&self, request: &OrderRequest) -> DomainResult<()>;
}

/// 立即通过
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateApproval;

#[async_trait]
impl PaymentApproval for ImmediateApproval {
    async fn approve(&self, _request: &OrderRequest) -> DomainResult<()> {
        Ok(())
    }
}

/// 固定耗时后通过，模拟较慢的支付网关
#[derive(Debug, Clone, Copy)]
pub struct DelayedApproval {
    delay: Duration,
}

impl DelayedApproval {
    pub const fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl PaymentApproval for DelayedApproval {
    async fn approve(&self, request: &OrderRequest) -> DomainResult<()> {
        tracing::debug!(order_uid = %request.order_uid, delay = ?self.delay, "awaiting payment approval");
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}
