//! 库存扣减门面
//!
//! `StockFacade` 在版本冲突时按 `RetryPolicy` 重试；
//! `DistributedLockStockFacade` 先获取 `lock:stock:{id}`，持锁期间执行一次扣减。
//!
use crate::command::Command;
use crate::command_handler::CommandHandler;
use crate::context::AppContext;
use crate::error::AppError;
use crate::retry::{RetryPolicy, cancellable, retry_on_conflict};
use async_trait::async_trait;
use flashsale_domain::lock::{DistributedLock, LockName, LockTimeouts, release_all};
use flashsale_domain::model::StockId;
use flashsale_domain::persist::ResourceStore;
use flashsale_domain::service::StockService;
use std::sync::Arc;

pub struct StockFacade<S: ResourceStore> {
    stocks: Arc<StockService<S>>,
    retry: RetryPolicy,
}

impl<S: ResourceStore> StockFacade<S> {
    pub fn new(stocks: Arc<StockService<S>>, retry: RetryPolicy) -> Self {
        Self { stocks, retry }
    }

    /// 扣减库存，返回剩余数量
    pub async fn decrease(
        &self,
        ctx: &AppContext,
        id: StockId,
        quantity: u64,
    ) -> Result<u64, AppError> {
        let outcome = retry_on_conflict(&self.retry, &ctx.cancellation, "decrease_stock", |_| {
            self.stocks
                .decrease_until(id, quantity, ctx.cancellation.cancelled())
        })
        .await?;
        Ok(outcome.value)
    }
}

pub struct DistributedLockStockFacade<S: ResourceStore> {
    stocks: Arc<StockService<S>>,
    locks: Arc<dyn DistributedLock>,
    timeouts: LockTimeouts,
}

impl<S: ResourceStore> DistributedLockStockFacade<S> {
    pub fn new(
        stocks: Arc<StockService<S>>,
        locks: Arc<dyn DistributedLock>,
        timeouts: LockTimeouts,
    ) -> Self {
        Self {
            stocks,
            locks,
            timeouts,
        }
    }

    /// 持锁扣减；获取锁超时即失败，不执行扣减
    pub async fn decrease(
        &self,
        ctx: &AppContext,
        id: StockId,
        quantity: u64,
    ) -> Result<u64, AppError> {
        let name = LockName::stock(id);
        let handle = cancellable(
            &ctx.cancellation,
            self.locks
                .try_acquire(&name, self.timeouts.wait, self.timeouts.hold),
        )
        .await
        .inspect_err(|err| tracing::info!(lock = %name, error = %err, "stock lock not acquired"))?;

        let result = self
            .stocks
            .decrease_until(id, quantity, ctx.cancellation.cancelled())
            .await;
        release_all(self.locks.as_ref(), vec![handle]).await;
        Ok(result?)
    }
}

/// 扣减库存
#[derive(Debug, Clone, Copy)]
pub struct DecreaseStock {
    pub stock_id: StockId,
    pub quantity: u64,
}

impl Command for DecreaseStock {
    const NAME: &'static str = "decrease_stock";
    type Output = u64;
}

#[async_trait]
impl<S: ResourceStore> CommandHandler<DecreaseStock> for StockFacade<S> {
    async fn handle(&self, ctx: &AppContext, cmd: DecreaseStock) -> Result<u64, AppError> {
        self.decrease(ctx, cmd.stock_id, cmd.quantity).await
    }
}

#[async_trait]
impl<S: ResourceStore> CommandHandler<DecreaseStock> for DistributedLockStockFacade<S> {
    async fn handle(&self, ctx: &AppContext, cmd: DecreaseStock) -> Result<u64, AppError> {
        self.decrease(ctx, cmd.stock_id, cmd.quantity).await
    }
}
