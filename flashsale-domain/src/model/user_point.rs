use super::{Resource, ResourceKind, UserId, UserPointId};
use crate::error::{DomainError, DomainResult};
use crate::value_object::Version;
use flashsale_macros::entity;

/// 用户积分余额
#[entity(id = UserPointId)]
#[derive(PartialEq, Eq)]
pub struct UserPoint {
    user_id: UserId,
    balance: u64,
}

impl UserPoint {
    pub fn new(id: UserPointId, user_id: UserId, balance: u64) -> Self {
        Self {
            id,
            version: Version::new(),
            user_id,
            balance,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    /// 使用积分，余额不足则拒绝
    pub fn use_points(&mut self, amount: u64) -> DomainResult<()> {
        if amount > self.balance {
            return Err(DomainError::InsufficientBalance {
                user_id: self.user_id.to_string(),
                requested: amount,
                available: self.balance,
            });
        }
        self.balance -= amount;
        Ok(())
    }

    /// 充值
    pub fn charge(&mut self, amount: u64) -> DomainResult<()> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| DomainError::InvalidValue {
                reason: format!("point balance overflow for user {}", self.user_id),
            })?;
        Ok(())
    }
}

impl Resource for UserPoint {
    const KIND: ResourceKind = ResourceKind::UserPoint;
    type LookupKey = UserId;

    fn lookup_key(&self) -> UserId {
        self.user_id
    }
}
