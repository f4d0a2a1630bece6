use super::{ProductId, Resource, ResourceKind, StockId};
use crate::entity::Entity;
use crate::error::{DomainError, DomainResult};
use crate::value_object::Version;
use flashsale_macros::entity;

/// 商品库存
#[entity(id = StockId)]
#[derive(PartialEq, Eq)]
pub struct Stock {
    product_id: ProductId,
    quantity: u64,
}

impl Stock {
    pub fn new(id: StockId, product_id: ProductId, quantity: u64) -> Self {
        Self {
            id,
            version: Version::new(),
            product_id,
            quantity,
        }
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn quantity(&self) -> u64 {
        self.quantity
    }

    /// 扣减库存，数量不能小于 0
    pub fn decrease(&mut self, quantity: u64) -> DomainResult<()> {
        if quantity > self.quantity {
            return Err(DomainError::InsufficientQuantity {
                kind: ResourceKind::Stock,
                id: self.id().to_string(),
                requested: quantity,
                available: self.quantity,
            });
        }
        self.quantity -= quantity;
        Ok(())
    }
}

impl Resource for Stock {
    const KIND: ResourceKind = ResourceKind::Stock;
    type LookupKey = ProductId;

    fn lookup_key(&self) -> ProductId {
        self.product_id
    }
}
