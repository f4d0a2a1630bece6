use super::{Cache, CacheKey};
use crate::error::DomainResult;
use crate::persist::CommitReceipt;
use serde::{Serialize, de::DeserializeOwned};
use std::future::Future;
use std::time::Duration;

/// 旁路读取：命中直接返回；未命中调用 `load` 读存储并按 `ttl` 回填。
///
/// 缓存读写失败或缓存值无法解析时只记录告警，结果始终以存储为准。
pub async fn read_through<T, F, Fut>(
    cache: &dyn Cache,
    key: &CacheKey,
    ttl: Duration,
    load: F,
) -> DomainResult<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = DomainResult<T>>,
{
    match cache.get(key).await {
        Ok(Some(cached)) => match serde_json::from_value::<T>(cached) {
            Ok(value) => {
                tracing::debug!(%key, "cache hit");
                return Ok(value);
            }
            Err(err) => {
                tracing::warn!(%key, error = %err, "undecodable cache entry, evicting");
                if let Err(err) = cache.delete(key).await {
                    tracing::warn!(%key, error = %err, "eviction of undecodable entry failed");
                }
            }
        },
        Ok(None) => tracing::debug!(%key, "cache miss"),
        Err(err) => tracing::warn!(%key, error = %err, "cache read failed, reading store"),
    }

    let value = load().await?;

    match serde_json::to_value(&value) {
        Ok(json) => {
            if let Err(err) = cache.set(key, json, ttl).await {
                tracing::warn!(%key, error = %err, "cache fill failed");
            }
        }
        Err(err) => tracing::warn!(%key, error = %err, "cache value not serializable"),
    }

    Ok(value)
}

/// 提交成功后淘汰事务登记的缓存键
///
/// 仅在拿到 `CommitReceipt` 之后调用；淘汰失败不影响已提交的结果。
pub async fn evict_committed(cache: &dyn Cache, receipt: &CommitReceipt) {
    for key in receipt.evictions() {
        match cache.delete(key).await {
            Ok(existed) => tracing::debug!(%key, existed, "evicted after commit"),
            Err(err) => tracing::warn!(%key, error = %err, "eviction after commit failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::model::ProductId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn read_through_loads_once_then_hits() {
        let cache = InMemoryCache::new();
        let key = CacheKey::product(ProductId::new(1));
        let loads = AtomicUsize::new(0);

        for _ in 0..3 {
            let v: u64 = read_through(&cache, &key, Duration::from_secs(10), || async {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok(42)
            })
            .await
            .unwrap();
            assert_eq!(v, 42);
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 2);
    }

    #[tokio::test]
    async fn failed_load_is_not_cached() {
        let cache = InMemoryCache::new();
        let key = CacheKey::product(ProductId::new(2));

        let err = read_through::<u64, _, _>(&cache, &key, Duration::from_secs(10), || async {
            Err(crate::error::DomainError::not_found(
                crate::model::ResourceKind::Product,
                2,
            ))
        })
        .await;
        assert!(err.is_err());
        assert!(!cache.contains(&key));
    }

    #[tokio::test]
    async fn undecodable_entry_falls_back_to_store() {
        let cache = InMemoryCache::new();
        let key = CacheKey::product(ProductId::new(3));
        cache
            .set(&key, serde_json::json!("not a number"), Duration::from_secs(10))
            .await
            .unwrap();

        let v: u64 = read_through(&cache, &key, Duration::from_secs(10), || async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(v, 7);
        assert_eq!(cache.get(&key).await.unwrap(), Some(serde_json::json!(7)));
    }

    /// 只读缓存：写入与删除一律失败
    struct ReadOnlyCache(InMemoryCache);

    #[async_trait::async_trait]
    impl Cache for ReadOnlyCache {
        async fn get(&self, key: &CacheKey) -> DomainResult<Option<serde_json::Value>> {
            self.0.get(key).await
        }

        async fn set(&self, _: &CacheKey, _: serde_json::Value, _: Duration) -> DomainResult<()> {
            Err(crate::error::DomainError::Cache {
                reason: "read only".into(),
            })
        }

        async fn delete(&self, _: &CacheKey) -> DomainResult<bool> {
            Err(crate::error::DomainError::Cache {
                reason: "read only".into(),
            })
        }
    }

    #[tokio::test]
    async fn failed_eviction_of_undecodable_entry_still_reads_store() {
        let inner = InMemoryCache::new();
        let key = CacheKey::product(ProductId::new(4));
        inner
            .set(&key, serde_json::json!({"broken": true}), Duration::from_secs(10))
            .await
            .unwrap();
        let cache = ReadOnlyCache(inner);

        let v: u64 = read_through(&cache, &key, Duration::from_secs(10), || async { Ok(11) })
            .await
            .unwrap();
        assert_eq!(v, 11);
        assert_eq!(
            cache.get(&key).await.unwrap(),
            Some(serde_json::json!({"broken": true}))
        );
    }
}
