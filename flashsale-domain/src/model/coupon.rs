use super::{CouponId, Resource, ResourceKind};
use crate::entity::Entity;
use crate::error::{DomainError, DomainResult};
use crate::value_object::Version;
use flashsale_macros::entity;

/// 限量优惠券
#[entity(id = CouponId)]
#[derive(PartialEq, Eq)]
pub struct Coupon {
    name: String,
    remaining: u64,
}

impl Coupon {
    pub fn new(id: CouponId, name: impl Into<String>, remaining: u64) -> Self {
        Self {
            id,
            version: Version::new(),
            name: name.into(),
            remaining,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// 发放一张，已领完则拒绝
    pub fn decrease(&mut self) -> DomainResult<()> {
        if self.remaining == 0 {
            return Err(DomainError::InsufficientQuantity {
                kind: ResourceKind::Coupon,
                id: self.id().to_string(),
                requested: 1,
                available: 0,
            });
        }
        self.remaining -= 1;
        Ok(())
    }
}

impl Resource for Coupon {
    const KIND: ResourceKind = ResourceKind::Coupon;
    type LookupKey = CouponId;

    fn lookup_key(&self) -> CouponId {
        self.id
    }
}
