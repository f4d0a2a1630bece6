use crate::cache::CacheKey;
use crate::error::DomainResult;
use crate::model::Resource;
use async_trait::async_trait;
use std::sync::Arc;

/// 读取资源时采用的并发控制方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LockMode {
    /// 普通读，不加锁也不校验
    #[default]
    None,
    /// 乐观读：记录读到的版本，提交时若已变化则失败
    Optimistic,
    /// 悲观读：持有行锁直到事务提交或回滚，其他悲观读者与写入者在此等待
    Pessimistic,
}

/// 提交回执：携带需要在提交成功后淘汰的缓存键
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReceipt {
    evictions: Vec<CacheKey>,
    written: usize,
}

impl CommitReceipt {
    pub(crate) fn new(evictions: Vec<CacheKey>, written: usize) -> Self {
        Self { evictions, written }
    }

    pub fn evictions(&self) -> &[CacheKey] {
        &self.evictions
    }

    /// 本次提交生效的行数（更新与插入）
    pub fn written(&self) -> usize {
        self.written
    }
}

/// 资源存储：开启事务的入口
pub trait ResourceStore: Send + Sync + 'static {
    type Tx: Transaction;

    fn begin(&self) -> Self::Tx;
}

impl<T> ResourceStore for Arc<T>
where
    T: ResourceStore + ?Sized,
{
    type Tx = T::Tx;

    fn begin(&self) -> Self::Tx {
        (**self).begin()
    }
}

/// 一次事务内的读写
///
/// 写入在 `commit` 之前只是暂存；事务被丢弃（或显式 `rollback`）时所有暂存写入与行锁一并释放。
#[async_trait]
pub trait Transaction: Send + Sized {
    async fn find_by_id<E: Resource>(
        &mut self,
        id: &E::Id,
        mode: LockMode,
    ) -> DomainResult<Option<E>>;

    /// 按业务键查找，如按商品查库存、按用户查积分
    async fn find_by_key<E: Resource>(
        &mut self,
        key: &E::LookupKey,
        mode: LockMode,
    ) -> DomainResult<Option<E>>;

    /// 暂存对已有资源的更新；资源不存在时立即返回 `NotFound`
    fn save<E: Resource>(&mut self, entity: E) -> DomainResult<()>;

    /// 暂存新资源；主键冲突在提交时以 `AlreadyExists` 报告
    fn insert<E: Resource>(&mut self, entity: E) -> DomainResult<()>;

    /// 登记提交成功后需要淘汰的缓存键
    fn evict_after_commit(&mut self, key: CacheKey);

    async fn commit(self) -> DomainResult<CommitReceipt>;

    fn rollback(self);

    async fn find_plain<E: Resource>(&mut self, key: &E::LookupKey) -> DomainResult<Option<E>> {
        self.find_by_key::<E>(key, LockMode::None).await
    }

    async fn find_for_optimistic_update<E: Resource>(
        &mut self,
        key: &E::LookupKey,
    ) -> DomainResult<Option<E>> {
        self.find_by_key::<E>(key, LockMode::Optimistic).await
    }

    async fn find_for_pessimistic_update<E: Resource>(
        &mut self,
        key: &E::LookupKey,
    ) -> DomainResult<Option<E>> {
        self.find_by_key::<E>(key, LockMode::Pessimistic).await
    }
}
