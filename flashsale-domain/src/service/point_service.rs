use crate::error::{DomainError, DomainResult};
use crate::model::{ResourceKind, UserId, UserPoint};
use crate::persist::{ResourceStore, Transaction};

/// 积分充值与查询
///
/// 充值以悲观读取积分行，与悲观下单互斥；混合策略下单不锁积分行，
/// 因此充值可以与之并发，由下单提交时的版本校验发现冲突。
pub struct UserPointService<S: ResourceStore> {
    store: S,
}

impl<S: ResourceStore> UserPointService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// 充值，返回充值后余额
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn charge(&self, user_id: UserId, amount: u64) -> DomainResult<u64> {
        let mut tx = self.store.begin();
        let mut point = tx
            .find_for_pessimistic_update::<UserPoint>(&user_id)
            .await?
            .ok_or_else(|| DomainError::not_found(ResourceKind::UserPoint, user_id))?;
        point.charge(amount)?;
        let balance = point.balance();
        tx.save(point)?;
        tx.commit().await?;
        Ok(balance)
    }

    pub async fn balance(&self, user_id: UserId) -> DomainResult<u64> {
        let mut tx = self.store.begin();
        let point = tx.find_plain::<UserPoint>(&user_id).await?;
        tx.rollback();
        point
            .map(|p| p.balance())
            .ok_or_else(|| DomainError::not_found(ResourceKind::UserPoint, user_id))
    }
}
