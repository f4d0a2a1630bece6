//! 下单门面（OrderFacade）
//!
//! 按策略编排一次下单：
//! - 乐观：冲突时按 `RetryPolicy` 整单重试，并累计冲突次数；
//! - 悲观 / 混合：单次尝试，冲突直接作为失败返回；
//! - 分布式锁：按 优惠券 → 库存 → 积分 的顺序获取命名锁，任一获取失败即整单失败，
//!   持锁期间以普通读执行，结束后按相反顺序释放。
//!
//! 取消只打断提交之前的步骤；已提交的订单照常返回并完成缓存淘汰。
//!
//! 另提供 `submit`：不在当前调用中落单，而是把请求发布到 `order-create` 主题。
//!
use crate::command::Command;
use crate::command_handler::CommandHandler;
use crate::context::AppContext;
use crate::error::AppError;
use crate::retry::{RetryPolicy, cancellable, retry_on_conflict};
use async_trait::async_trait;
use bon::Builder;
use flashsale_domain::eventing::{OrderProducer, QueueRecord};
use flashsale_domain::lock::{DistributedLock, LockName, LockTimeouts, acquire_all, release_all};
use flashsale_domain::model::{Order, OrderRequest};
use flashsale_domain::persist::ResourceStore;
use flashsale_domain::service::{ConcurrencyStrategy, LockPlan, OrderService};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Builder)]
pub struct OrderFacade<S: ResourceStore> {
    orders: Arc<OrderService<S>>,
    locks: Arc<dyn DistributedLock>,
    producer: Option<Arc<dyn OrderProducer>>,
    #[builder(default)]
    lock_timeouts: LockTimeouts,
    #[builder(default)]
    retry: RetryPolicy,
    #[builder(skip)]
    conflicts: AtomicU64,
}

impl<S: ResourceStore> OrderFacade<S> {
    /// 乐观策略下累计观察到的版本冲突次数
    pub fn conflict_count(&self) -> u64 {
        self.conflicts.load(Ordering::Relaxed)
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    #[tracing::instrument(
        level = "info",
        skip_all,
        fields(strategy = %strategy, correlation_id = %ctx.correlation_id, order_uid = %request.order_uid)
    )]
    pub async fn place_order(
        &self,
        ctx: &AppContext,
        request: &OrderRequest,
        strategy: ConcurrencyStrategy,
    ) -> Result<Order, AppError> {
        match strategy {
            ConcurrencyStrategy::Optimistic => self.place_with_retry(ctx, request).await,
            ConcurrencyStrategy::Pessimistic | ConcurrencyStrategy::Hybrid => {
                let plan = strategy.lock_plan();
                Ok(self
                    .orders
                    .place_order_until(request, plan, ctx.cancellation.cancelled())
                    .await?)
            }
            ConcurrencyStrategy::DistributedLock => self.place_under_locks(ctx, request).await,
        }
    }

    async fn place_with_retry(&self, ctx: &AppContext, request: &OrderRequest) -> Result<Order, AppError> {
        let result = retry_on_conflict(&self.retry, &ctx.cancellation, "place_order", |_| {
            self.orders
                .place_order_until(request, LockPlan::OPTIMISTIC, ctx.cancellation.cancelled())
        })
        .await;

        match result {
            Ok(outcome) => {
                self.record_conflicts(outcome.attempts - 1);
                Ok(outcome.value)
            }
            Err(AppError::RetryExhausted { attempts, last }) => {
                self.record_conflicts(attempts);
                Err(AppError::RetryExhausted { attempts, last })
            }
            Err(err) => Err(err),
        }
    }

    async fn place_under_locks(&self, ctx: &AppContext, request: &OrderRequest) -> Result<Order, AppError> {
        let stock_id = cancellable(&ctx.cancellation, self.orders.resolve_stock_id(request.product_id)).await?;
        let names = [
            LockName::coupon(request.coupon_id),
            LockName::stock(stock_id),
            LockName::point(request.user_id),
        ];

        // 取消发生在获取途中时，已拿到的锁由租约到期回收
        let handles = cancellable(
            &ctx.cancellation,
            acquire_all(self.locks.as_ref(), &names, self.lock_timeouts),
        )
        .await
        .inspect_err(|err| tracing::warn!(error = %err, "distributed lock acquisition failed"))?;

        let result = self
            .orders
            .place_order_until(request, LockPlan::UNLOCKED, ctx.cancellation.cancelled())
            .await;
        release_all(self.locks.as_ref(), handles).await;
        Ok(result?)
    }

    /// 发布到 `order-create` 主题，由消费者异步落单
    pub async fn submit(&self, request: &OrderRequest) -> Result<QueueRecord, AppError> {
        let producer = self
            .producer
            .as_ref()
            .ok_or_else(|| AppError::Config("no order producer configured".into()))?;
        let record = producer.publish_order(request).await?;
        tracing::info!(order_uid = %request.order_uid, partition = record.partition, offset = record.offset, "order submitted");
        Ok(record)
    }

    fn record_conflicts(&self, n: u32) {
        if n > 0 {
            self.conflicts.fetch_add(u64::from(n), Ordering::Relaxed);
        }
    }
}

/// 同步下单
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub request: OrderRequest,
    pub strategy: ConcurrencyStrategy,
}

impl Command for PlaceOrder {
    const NAME: &'static str = "place_order";
    type Output = Order;
}

/// 异步下单：只发布消息
#[derive(Debug, Clone)]
pub struct SubmitOrder {
    pub request: OrderRequest,
}

impl Command for SubmitOrder {
    const NAME: &'static str = "submit_order";
    type Output = QueueRecord;
}

#[async_trait]
impl<S: ResourceStore> CommandHandler<PlaceOrder> for OrderFacade<S> {
    async fn handle(&self, ctx: &AppContext, cmd: PlaceOrder) -> Result<Order, AppError> {
        self.place_order(ctx, &cmd.request, cmd.strategy).await
    }
}

#[async_trait]
impl<S: ResourceStore> CommandHandler<SubmitOrder> for OrderFacade<S> {
    async fn handle(&self, _ctx: &AppContext, cmd: SubmitOrder) -> Result<QueueRecord, AppError> {
        self.submit(&cmd.request).await
    }
}
