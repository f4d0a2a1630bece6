use crate::cache::{Cache, CacheKey, CacheTtl, read_through};
use crate::entity::Entity;
use crate::error::{DomainError, DomainResult};
use crate::model::{Product, ProductId, ResourceKind};
use crate::persist::{LockMode, ResourceStore, Transaction};
use bon::Builder;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 商品的只读视图，同时是 `product:{id}` 的缓存值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductView {
    pub id: ProductId,
    pub name: String,
    pub price: u64,
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        Self {
            id: *product.id(),
            name: product.name().to_string(),
            price: product.price(),
        }
    }
}

#[derive(Builder)]
pub struct ProductService<S: ResourceStore> {
    store: S,
    cache: Arc<dyn Cache>,
    #[builder(default)]
    ttl: CacheTtl,
}

impl<S: ResourceStore> ProductService<S> {
    pub async fn get_product(&self, id: ProductId) -> DomainResult<ProductView> {
        read_through(self.cache.as_ref(), &CacheKey::product(id), self.ttl.product, || async {
            let mut tx = self.store.begin();
            let product = tx.find_by_id::<Product>(&id, LockMode::None).await?;
            tx.rollback();
            product
                .as_ref()
                .map(ProductView::from)
                .ok_or_else(|| DomainError::not_found(ResourceKind::Product, id))
        })
        .await
    }
}
