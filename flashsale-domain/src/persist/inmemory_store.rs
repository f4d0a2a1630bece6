//! 内存版资源存储（InMemoryStore）
//!
//! 每种资源一张表（按 `TypeId` 擦除类型后存放），每行带一个异步行锁与已提交快照。
//! 提交流程：
//! 1. 对尚未持有行锁的写入目标，按全局顺序（资源种类、主键）补齐行锁；
//! 2. 进入存储级提交临界区，校验全部乐观读与写入的版本；
//! 3. 全部通过后一次性应用写入（更新版本 +1，插入新行），否则整体失败。
//!
use super::{CommitReceipt, LockMode, ResourceStore, Transaction};
use crate::cache::CacheKey;
use crate::error::{DomainError, DomainResult};
use crate::model::{Resource, ResourceKind};
use crate::value_object::Version;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;

/// 行锁默认等待上限
pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(10);

type RowLock = Arc<tokio::sync::Mutex<()>>;

struct Row<E> {
    current: RwLock<E>,
    lock: RowLock,
}

struct Table<E: Resource> {
    rows: DashMap<E::Id, Arc<Row<E>>>,
    index: DashMap<E::LookupKey, E::Id>,
}

impl<E: Resource> Default for Table<E> {
    fn default() -> Self {
        Self {
            rows: DashMap::new(),
            index: DashMap::new(),
        }
    }
}

impl<E: Resource> Table<E> {
    fn row(&self, id: &E::Id) -> Option<Arc<Row<E>>> {
        self.rows.get(id).map(|r| Arc::clone(r.value()))
    }

    fn row_by_key(&self, key: &E::LookupKey) -> Option<Arc<Row<E>>> {
        let id = self.index.get(key).map(|id| id.value().clone())?;
        self.row(&id)
    }

    fn insert_row(&self, entity: E) -> bool {
        let id = entity.id().clone();
        let key = entity.lookup_key();
        match self.rows.entry(id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::new(Row {
                    current: RwLock::new(entity),
                    lock: Arc::new(tokio::sync::Mutex::new(())),
                }));
                self.index.insert(key, id);
                true
            }
        }
    }
}

/// 行标识：全局加锁顺序即该类型的排序（先资源种类，再主键）
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct RowRef {
    kind: ResourceKind,
    id: String,
}

impl RowRef {
    fn of<E: Resource>(id: &E::Id) -> Self {
        Self {
            kind: E::KIND,
            id: id.to_string(),
        }
    }

    fn resource(&self) -> String {
        format!("{}:{}", self.kind, self.id)
    }
}

/// 暂存的写入或版本校验
trait PendingWrite: Send + Sync {
    /// 需要在提交前持有的行锁；插入没有既有行
    fn row_lock(&self) -> Option<RowLock>;

    fn validate(&self) -> DomainResult<()>;

    fn apply(self: Box<Self>);
}

fn check_version<E: Resource>(row: &Row<E>, expected: Version) -> DomainResult<()> {
    let current = row.current.read();
    let actual = current.version();
    if actual == expected {
        Ok(())
    } else {
        Err(DomainError::VersionConflict {
            kind: E::KIND,
            id: current.id().to_string(),
            expected,
            actual,
        })
    }
}

struct VersionCheck<E> {
    row: Arc<Row<E>>,
    expected: Version,
}

impl<E: Resource> PendingWrite for VersionCheck<E> {
    fn row_lock(&self) -> Option<RowLock> {
        None
    }

    fn validate(&self) -> DomainResult<()> {
        check_version(&self.row, self.expected)
    }

    fn apply(self: Box<Self>) {}
}

struct Update<E> {
    row: Arc<Row<E>>,
    entity: E,
}

impl<E: Resource> PendingWrite for Update<E> {
    fn row_lock(&self) -> Option<RowLock> {
        Some(Arc::clone(&self.row.lock))
    }

    fn validate(&self) -> DomainResult<()> {
        check_version(&self.row, self.entity.version())
    }

    fn apply(self: Box<Self>) {
        let Update { row, mut entity } = *self;
        entity.set_version(entity.version().next());
        *row.current.write() = entity;
    }
}

struct Insert<E: Resource> {
    table: Arc<Table<E>>,
    entity: E,
}

impl<E: Resource> PendingWrite for Insert<E> {
    fn row_lock(&self) -> Option<RowLock> {
        None
    }

    fn validate(&self) -> DomainResult<()> {
        if self.table.rows.contains_key(self.entity.id()) {
            return Err(DomainError::AlreadyExists {
                kind: E::KIND,
                id: self.entity.id().to_string(),
            });
        }
        Ok(())
    }

    fn apply(self: Box<Self>) {
        let Insert { table, entity } = *self;
        table.insert_row(entity);
    }
}

struct StoreInner {
    tables: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    commit_lock: Mutex<()>,
    lock_wait: Duration,
    next_tx: AtomicU64,
}

/// 进程内事务性资源存储
///
/// 克隆开销很小，所有克隆共享同一份数据。
#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<StoreInner>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_lock_wait(DEFAULT_LOCK_WAIT)
    }

    /// 指定行锁等待上限；超时以 `LockAcquisitionTimeout` 失败
    pub fn with_lock_wait(lock_wait: Duration) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                tables: DashMap::new(),
                commit_lock: Mutex::new(()),
                lock_wait,
                next_tx: AtomicU64::new(1),
            }),
        }
    }

    fn table<E: Resource>(&self) -> DomainResult<Arc<Table<E>>> {
        let erased = self
            .inner
            .tables
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Arc::new(Table::<E>::default()) as Arc<dyn Any + Send + Sync>)
            .value()
            .clone();

        erased.downcast::<Table<E>>().map_err(|_| {
            DomainError::repository(format!("table type mismatch for {}", E::KIND))
        })
    }

    /// 初始化数据：直接写入已提交状态
    pub fn seed<E: Resource>(&self, entity: E) -> DomainResult<()> {
        let id = entity.id().to_string();
        if self.table::<E>()?.insert_row(entity) {
            Ok(())
        } else {
            Err(DomainError::AlreadyExists { kind: E::KIND, id })
        }
    }

    /// 读取已提交快照（事务外）
    pub fn get<E: Resource>(&self, id: &E::Id) -> DomainResult<Option<E>> {
        Ok(self
            .table::<E>()?
            .row(id)
            .map(|row| row.current.read().clone()))
    }

    pub fn get_by_key<E: Resource>(&self, key: &E::LookupKey) -> DomainResult<Option<E>> {
        Ok(self
            .table::<E>()?
            .row_by_key(key)
            .map(|row| row.current.read().clone()))
    }

    pub fn count<E: Resource>(&self) -> DomainResult<usize> {
        Ok(self.table::<E>()?.rows.len())
    }
}

impl ResourceStore for InMemoryStore {
    type Tx = InMemoryTransaction;

    fn begin(&self) -> InMemoryTransaction {
        InMemoryTransaction {
            store: self.clone(),
            tx_id: self.inner.next_tx.fetch_add(1, Ordering::Relaxed),
            held: BTreeMap::new(),
            checks: BTreeMap::new(),
            writes: BTreeMap::new(),
            evictions: Vec::new(),
        }
    }
}

/// `InMemoryStore` 上的事务
///
/// 行锁保存在 `held` 中，事务结束（提交、回滚或被丢弃）时随之释放。
pub struct InMemoryTransaction {
    store: InMemoryStore,
    tx_id: u64,
    held: BTreeMap<RowRef, OwnedMutexGuard<()>>,
    checks: BTreeMap<RowRef, Box<dyn PendingWrite>>,
    writes: BTreeMap<RowRef, Box<dyn PendingWrite>>,
    evictions: Vec<CacheKey>,
}

impl InMemoryTransaction {
    pub fn id(&self) -> u64 {
        self.tx_id
    }

    async fn lock_row(&mut self, target: RowRef, lock: RowLock) -> DomainResult<()> {
        if self.held.contains_key(&target) {
            return Ok(());
        }

        let wait = self.store.inner.lock_wait;
        match tokio::time::timeout(wait, lock.lock_owned()).await {
            Ok(guard) => {
                tracing::trace!(tx = self.tx_id, row = %target.resource(), "row lock acquired");
                self.held.insert(target, guard);
                Ok(())
            }
            Err(_) => {
                tracing::debug!(tx = self.tx_id, row = %target.resource(), ?wait, "row lock wait timed out");
                Err(DomainError::LockAcquisitionTimeout {
                    resource: target.resource(),
                    waited: wait,
                })
            }
        }
    }

    async fn read_row<E: Resource>(&mut self, row: Arc<Row<E>>, mode: LockMode) -> DomainResult<E> {
        let target = RowRef::of::<E>(row.current.read().id());

        if mode == LockMode::Pessimistic {
            self.lock_row(target.clone(), Arc::clone(&row.lock)).await?;
        }

        let entity = row.current.read().clone();

        if mode == LockMode::Optimistic {
            let expected = entity.version();
            self.checks
                .insert(target, Box::new(VersionCheck { row, expected }));
        }

        Ok(entity)
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn find_by_id<E: Resource>(
        &mut self,
        id: &E::Id,
        mode: LockMode,
    ) -> DomainResult<Option<E>> {
        let Some(row) = self.store.table::<E>()?.row(id) else {
            return Ok(None);
        };
        self.read_row(row, mode).await.map(Some)
    }

    async fn find_by_key<E: Resource>(
        &mut self,
        key: &E::LookupKey,
        mode: LockMode,
    ) -> DomainResult<Option<E>> {
        let Some(row) = self.store.table::<E>()?.row_by_key(key) else {
            return Ok(None);
        };
        self.read_row(row, mode).await.map(Some)
    }

    fn save<E: Resource>(&mut self, entity: E) -> DomainResult<()> {
        let row = self
            .store
            .table::<E>()?
            .row(entity.id())
            .ok_or_else(|| DomainError::not_found(E::KIND, entity.id()))?;
        self.writes
            .insert(RowRef::of::<E>(entity.id()), Box::new(Update { row, entity }));
        Ok(())
    }

    fn insert<E: Resource>(&mut self, entity: E) -> DomainResult<()> {
        let table = self.store.table::<E>()?;
        let target = RowRef::of::<E>(entity.id());
        if self.writes.contains_key(&target) {
            return Err(DomainError::AlreadyExists {
                kind: E::KIND,
                id: target.id,
            });
        }
        self.writes.insert(target, Box::new(Insert { table, entity }));
        Ok(())
    }

    fn evict_after_commit(&mut self, key: CacheKey) {
        if !self.evictions.contains(&key) {
            self.evictions.push(key);
        }
    }

    async fn commit(mut self) -> DomainResult<CommitReceipt> {
        // 补齐写入目标的行锁；BTreeMap 迭代即全局加锁顺序
        let pending: Vec<(RowRef, RowLock)> = self
            .writes
            .iter()
            .filter(|(target, _)| !self.held.contains_key(*target))
            .filter_map(|(target, write)| write.row_lock().map(|lock| (target.clone(), lock)))
            .collect();
        for (target, lock) in pending {
            self.lock_row(target, lock).await?;
        }

        let writes = std::mem::take(&mut self.writes);
        let written = writes.len();
        {
            let _critical = self.store.inner.commit_lock.lock();
            for pending in self.checks.values().chain(writes.values()) {
                pending.validate()?;
            }
            for (_, write) in writes {
                write.apply();
            }
        }

        tracing::debug!(tx = self.tx_id, written, "transaction committed");
        Ok(CommitReceipt::new(std::mem::take(&mut self.evictions), written))
    }

    fn rollback(self) {
        tracing::debug!(
            tx = self.tx_id,
            staged = self.writes.len(),
            "transaction rolled back"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use crate::model::{Coupon, CouponId, ProductId, Stock, StockId};

    fn store_with_stock(quantity: u64) -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .seed(Stock::new(StockId::new(1), ProductId::new(10), quantity))
            .unwrap();
        store
    }

    #[tokio::test]
    async fn commit_applies_writes_and_bumps_version() {
        let store = store_with_stock(5);
        let mut tx = store.begin();
        let mut stock: Stock = tx
            .find_for_optimistic_update(&ProductId::new(10))
            .await
            .unwrap()
            .unwrap();
        stock.decrease(2).unwrap();
        tx.save(stock).unwrap();
        tx.evict_after_commit(CacheKey::stock(StockId::new(1)));
        let receipt = tx.commit().await.unwrap();

        assert_eq!(receipt.written(), 1);
        assert_eq!(receipt.evictions(), &[CacheKey::stock(StockId::new(1))]);
        let stored: Stock = store.get(&StockId::new(1)).unwrap().unwrap();
        assert_eq!(stored.quantity(), 3);
        assert_eq!(stored.version(), Version::from_value(1));
    }

    #[tokio::test]
    async fn dropped_transaction_leaves_store_untouched() {
        let store = store_with_stock(5);
        {
            let mut tx = store.begin();
            let mut stock: Stock = tx.find_by_id(&StockId::new(1), LockMode::Pessimistic)
                .await
                .unwrap()
                .unwrap();
            stock.decrease(5).unwrap();
            tx.save(stock).unwrap();
        }
        let stored: Stock = store.get(&StockId::new(1)).unwrap().unwrap();
        assert_eq!(stored.quantity(), 5);

        // 行锁随事务释放
        let mut tx = store.begin();
        let again: Option<Stock> = tx
            .find_by_id(&StockId::new(1), LockMode::Pessimistic)
            .await
            .unwrap();
        assert!(again.is_some());
    }

    #[tokio::test]
    async fn stale_optimistic_read_conflicts_at_commit() {
        let store = store_with_stock(5);

        let mut first = store.begin();
        let mut a: Stock = first
            .find_for_optimistic_update(&ProductId::new(10))
            .await
            .unwrap()
            .unwrap();
        let mut second = store.begin();
        let mut b: Stock = second
            .find_for_optimistic_update(&ProductId::new(10))
            .await
            .unwrap()
            .unwrap();

        a.decrease(1).unwrap();
        first.save(a).unwrap();
        first.commit().await.unwrap();

        b.decrease(1).unwrap();
        second.save(b).unwrap();
        let err = second.commit().await.unwrap_err();
        assert!(err.is_retryable(), "unexpected {err:?}");

        let stored: Stock = store.get(&StockId::new(1)).unwrap().unwrap();
        assert_eq!(stored.quantity(), 4);
    }

    #[tokio::test]
    async fn failed_validation_applies_nothing() {
        let store = store_with_stock(5);
        store
            .seed(Coupon::new(CouponId::new(1), "welcome", 3))
            .unwrap();

        let mut tx = store.begin();
        let mut coupon: Coupon = tx
            .find_for_optimistic_update(&CouponId::new(1))
            .await
            .unwrap()
            .unwrap();
        let mut stock: Stock = tx
            .find_for_optimistic_update(&ProductId::new(10))
            .await
            .unwrap()
            .unwrap();

        // 另一事务抢先改了库存
        let mut other = store.begin();
        let mut s: Stock = other.find_plain(&ProductId::new(10)).await.unwrap().unwrap();
        s.decrease(1).unwrap();
        other.save(s).unwrap();
        other.commit().await.unwrap();

        coupon.decrease().unwrap();
        stock.decrease(1).unwrap();
        tx.save(coupon).unwrap();
        tx.save(stock).unwrap();
        assert!(tx.commit().await.is_err());

        let coupon: Coupon = store.get(&CouponId::new(1)).unwrap().unwrap();
        assert_eq!(coupon.remaining(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn pessimistic_read_times_out_while_row_is_held() {
        let store = InMemoryStore::with_lock_wait(Duration::from_millis(200));
        store
            .seed(Stock::new(StockId::new(1), ProductId::new(10), 1))
            .unwrap();

        let mut holder = store.begin();
        let _held: Stock = holder
            .find_for_pessimistic_update(&ProductId::new(10))
            .await
            .unwrap()
            .unwrap();

        let mut waiter = store.begin();
        let err = waiter
            .find_for_pessimistic_update::<Stock>(&ProductId::new(10))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::LockAcquisitionTimeout { .. }));
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let store = store_with_stock(1);
        let mut tx = store.begin();
        tx.insert(Stock::new(StockId::new(1), ProductId::new(11), 1))
            .unwrap();
        let err = tx.commit().await.unwrap_err();
        assert!(matches!(err, DomainError::AlreadyExists { .. }));
        assert_eq!(store.count::<Stock>().unwrap(), 1);
    }

    #[tokio::test]
    async fn save_of_unknown_row_is_not_found() {
        let store = InMemoryStore::new();
        let mut tx = store.begin();
        let err = tx
            .save(Stock::new(StockId::new(9), ProductId::new(9), 1))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }
}
