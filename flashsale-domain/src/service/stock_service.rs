use super::unless_cancelled;
use crate::cache::{Cache, CacheKey, CacheTtl, evict_committed, read_through};
use crate::error::{DomainError, DomainResult};
use crate::model::{ResourceKind, Stock, StockId};
use crate::persist::{LockMode, ResourceStore, Transaction};
use bon::Builder;
use std::future::Future;
use std::sync::Arc;

/// 库存读写
///
/// 读取走旁路缓存；扣减为普通读加版本校验写入，提交成功后淘汰 `stock:{id}`。
/// 并发扣减的互斥由调用方负责（重试或分布式锁）。
#[derive(Builder)]
pub struct StockService<S: ResourceStore> {
    store: S,
    cache: Arc<dyn Cache>,
    #[builder(default)]
    ttl: CacheTtl,
}

impl<S: ResourceStore> StockService<S> {
    pub async fn get_stock_quantity(&self, id: StockId) -> DomainResult<u64> {
        read_through(self.cache.as_ref(), &CacheKey::stock(id), self.ttl.stock, || async {
            let mut tx = self.store.begin();
            let stock = tx.find_by_id::<Stock>(&id, LockMode::None).await?;
            tx.rollback();
            stock
                .map(|s| s.quantity())
                .ok_or_else(|| DomainError::not_found(ResourceKind::Stock, id))
        })
        .await
    }

    /// 扣减库存，返回剩余数量
    pub async fn decrease(&self, id: StockId, quantity: u64) -> DomainResult<u64> {
        self.decrease_until(id, quantity, std::future::pending()).await
    }

    /// 同 `decrease`，`cancelled` 只能打断提交之前的读取
    #[tracing::instrument(level = "debug", skip(self, cancelled))]
    pub async fn decrease_until<C>(&self, id: StockId, quantity: u64, cancelled: C) -> DomainResult<u64>
    where
        C: Future<Output = ()> + Send,
    {
        let mut tx = self.store.begin();
        let mut stock = unless_cancelled(cancelled, tx.find_by_id::<Stock>(&id, LockMode::None))
            .await?
            .ok_or_else(|| DomainError::not_found(ResourceKind::Stock, id))?;
        stock.decrease(quantity)?;
        let remaining = stock.quantity();

        tx.save(stock)?;
        tx.evict_after_commit(CacheKey::stock(id));
        let receipt = tx.commit().await?;

        evict_committed(self.cache.as_ref(), &receipt).await;
        Ok(remaining)
    }
}
