use super::{ProductId, Resource, ResourceKind};
use crate::value_object::Version;
use flashsale_macros::entity;

/// 商品目录（只读）
#[entity(id = ProductId)]
#[derive(PartialEq, Eq)]
pub struct Product {
    name: String,
    price: u64,
}

impl Product {
    pub fn new(id: ProductId, name: impl Into<String>, price: u64) -> Self {
        Self {
            id,
            version: Version::new(),
            name: name.into(),
            price,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> u64 {
        self.price
    }
}

impl Resource for Product {
    const KIND: ResourceKind = ResourceKind::Product;
    type LookupKey = ProductId;

    fn lookup_key(&self) -> ProductId {
        self.id
    }
}
