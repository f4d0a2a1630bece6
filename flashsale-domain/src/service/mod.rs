//! 并发控制器（service）
//!
//! 同一个“扣优惠券 → 扣库存 → 扣积分 → 写订单”的事务，按四种策略执行：
//! - 乐观：三者均乐观读，提交时版本冲突则整单失败（由上层重试）；
//! - 悲观：三者均持有行锁直到提交；
//! - 混合：优惠券与库存悲观，积分不加锁，提交时以版本校验兜底；
//! - 分布式锁：先按固定顺序获取命名锁，再以普通读执行。
//!
mod approval;
mod order_service;
mod point_service;
mod product_service;
mod stock_service;
mod strategy;

pub use approval::{DelayedApproval, ImmediateApproval, PaymentApproval};
pub use order_service::{AttemptPhase, DEFAULT_POINT_COST, OrderService};
pub use point_service::UserPointService;
pub use product_service::{ProductService, ProductView};
pub use stock_service::StockService;
pub use strategy::{ConcurrencyStrategy, LockPlan};

use crate::error::{DomainError, DomainResult};
use std::future::Future;

/// `cancelled` 先完成时丢弃 `fut` 并返回 `Cancelled`
async fn unless_cancelled<T, C, F>(cancelled: C, fut: F) -> DomainResult<T>
where
    C: Future<Output = ()>,
    F: Future<Output = DomainResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancelled => Err(DomainError::Cancelled),
        result = fut => result,
    }
}
