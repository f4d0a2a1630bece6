//! 下单服务（OrderService）
//!
//! 单次尝试：开启事务，按 `LockPlan` 依次读取并扣减优惠券、库存与积分，写入订单，
//! 提交成功后淘汰库存缓存。任何一步失败都会整体回滚，不留下部分扣减。
//! 重试、取消与分布式锁由应用层在外围编排。
//!
use super::approval::{ImmediateApproval, PaymentApproval};
use super::strategy::LockPlan;
use super::unless_cancelled;
use crate::cache::{Cache, CacheKey, evict_committed};
use crate::domain_service::DomainService;
use crate::entity::Entity;
use crate::error::{DomainError, DomainResult};
use crate::model::{Coupon, Order, OrderRequest, ProductId, ResourceKind, Stock, StockId, UserPoint};
use crate::persist::{ResourceStore, Transaction};
use async_trait::async_trait;
use bon::Builder;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// 每单扣减的积分
pub const DEFAULT_POINT_COST: u64 = 1000;

/// 单次尝试所处阶段，随日志输出
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptPhase {
    Pending,
    LocksAcquired,
    ConflictDetected,
    BusinessRejected,
    Committed,
    RolledBack,
}

impl AttemptPhase {
    pub const fn as_str(&self) -> &'static str {
        match self {
            AttemptPhase::Pending => "pending",
            AttemptPhase::LocksAcquired => "locks_acquired",
            AttemptPhase::ConflictDetected => "conflict_detected",
            AttemptPhase::BusinessRejected => "business_rejected",
            AttemptPhase::Committed => "committed",
            AttemptPhase::RolledBack => "rolled_back",
        }
    }

    fn of_failure(err: &DomainError) -> Self {
        if err.is_retryable() {
            AttemptPhase::ConflictDetected
        } else if err.is_business_rejection() {
            AttemptPhase::BusinessRejected
        } else {
            AttemptPhase::RolledBack
        }
    }
}

impl fmt::Display for AttemptPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Builder)]
pub struct OrderService<S: ResourceStore> {
    store: S,
    cache: Arc<dyn Cache>,
    #[builder(default = Arc::new(ImmediateApproval) as Arc<dyn PaymentApproval>)]
    approval: Arc<dyn PaymentApproval>,
    #[builder(default = DEFAULT_POINT_COST)]
    point_cost: u64,
}

impl<S: ResourceStore> OrderService<S> {
    pub fn point_cost(&self) -> u64 {
        self.point_cost
    }

    /// 执行一次下单尝试
    pub async fn place_order(&self, request: &OrderRequest, plan: LockPlan) -> DomainResult<Order> {
        self.place_order_until(request, plan, std::future::pending()).await
    }

    /// 执行一次下单尝试，`cancelled` 完成时放弃
    ///
    /// 取消只作用于提交之前：已开始提交的尝试会完成提交与缓存淘汰，并返回订单。
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(order_uid = %request.order_uid, user_id = %request.user_id, product_id = %request.product_id)
    )]
    pub async fn place_order_until<C>(
        &self,
        request: &OrderRequest,
        plan: LockPlan,
        cancelled: C,
    ) -> DomainResult<Order>
    where
        C: Future<Output = ()> + Send,
    {
        tracing::debug!(phase = %AttemptPhase::Pending, ?plan, "order attempt started");
        let mut tx = self.store.begin();

        let staged = unless_cancelled(cancelled, self.stage(&mut tx, request, plan)).await;
        let order = match staged {
            Ok(order) => order,
            Err(err) => {
                tracing::debug!(phase = %AttemptPhase::of_failure(&err), error = %err, "order attempt failed");
                tx.rollback();
                return Err(err);
            }
        };

        let receipt = tx.commit().await.inspect_err(|err| {
            tracing::debug!(phase = %AttemptPhase::of_failure(err), error = %err, "order commit failed");
        })?;

        evict_committed(self.cache.as_ref(), &receipt).await;
        tracing::debug!(phase = %AttemptPhase::Committed, order_id = %order.id(), "order committed");
        Ok(order)
    }

    async fn stage(
        &self,
        tx: &mut S::Tx,
        request: &OrderRequest,
        plan: LockPlan,
    ) -> DomainResult<Order> {
        let mut coupon = tx
            .find_by_key::<Coupon>(&request.coupon_id, plan.coupon)
            .await?
            .ok_or_else(|| DomainError::not_found(ResourceKind::Coupon, request.coupon_id))?;
        coupon.decrease()?;

        let mut stock = tx
            .find_by_key::<Stock>(&request.product_id, plan.stock)
            .await?
            .ok_or_else(|| stock_not_found(request.product_id))?;
        stock.decrease(1)?;

        let mut point = tx
            .find_by_key::<UserPoint>(&request.user_id, plan.point)
            .await?
            .ok_or_else(|| DomainError::not_found(ResourceKind::UserPoint, request.user_id))?;
        tracing::debug!(phase = %AttemptPhase::LocksAcquired, "resources read");

        self.approval.approve(request).await?;
        point.use_points(self.point_cost)?;

        tx.evict_after_commit(CacheKey::stock(*stock.id()));
        tx.save(coupon)?;
        tx.save(stock)?;
        tx.save(point)?;

        let order = Order::place(request);
        tx.insert(order.clone())?;
        Ok(order)
    }

    /// 按商品解析库存主键（普通读，不加锁）
    ///
    /// 分布式锁策略需要在获取 `lock:stock:{id}` 之前知道库存主键。
    pub async fn resolve_stock_id(&self, product_id: ProductId) -> DomainResult<StockId> {
        let mut tx = self.store.begin();
        let stock = tx.find_plain::<Stock>(&product_id).await?;
        tx.rollback();
        stock
            .map(|s| *s.id())
            .ok_or_else(|| stock_not_found(product_id))
    }
}

fn stock_not_found(product_id: ProductId) -> DomainError {
    DomainError::not_found(ResourceKind::Stock, format!("for product {product_id}"))
}

#[async_trait]
impl<S: ResourceStore> DomainService for OrderService<S> {
    type Input = (OrderRequest, LockPlan);
    type Output = Order;
    type Error = DomainError;

    async fn execute(&self, input: Self::Input) -> DomainResult<Order> {
        let (request, plan) = input;
        self.place_order(&request, plan).await
    }
}
