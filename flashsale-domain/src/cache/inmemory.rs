//! 内存版缓存（InMemoryCache）
//!
//! 基于 `DashMap` 的带过期时间缓存，过期条目在读取时视为未命中并惰性清除。
//! 过期判断使用 `tokio::time::Instant`，在暂停时钟的测试中同样生效。

use super::{Cache, CacheKey};
use crate::error::DomainResult;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

struct Entry {
    value: Value,
    expires_at: Instant,
}

/// 命中/未命中计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Default)]
pub struct InMemoryCache {
    entries: DashMap<CacheKey, Entry>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// 当前未过期的键是否存在
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries
            .get(key)
            .is_some_and(|e| e.expires_at > Instant::now())
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &CacheKey) -> DomainResult<Option<Value>> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key)
            && entry.expires_at > now
        {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(entry.value.clone()));
        }

        self.entries.remove_if(key, |_, e| e.expires_at <= now);
        self.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    async fn set(&self, key: &CacheKey, value: Value, ttl: Duration) -> DomainResult<()> {
        self.entries.insert(
            key.clone(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> DomainResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StockId;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = InMemoryCache::new();
        let key = CacheKey::stock(StockId::new(1));

        cache.set(&key, json!(100), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), Some(json!(100)));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.get(&key).await.unwrap(), None);
        assert!(!cache.contains(&key));
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[tokio::test]
    async fn delete_reports_presence() {
        let cache = InMemoryCache::new();
        let key = CacheKey::stock(StockId::new(2));
        assert!(!cache.delete(&key).await.unwrap());

        cache.set(&key, json!(1), Duration::from_secs(5)).await.unwrap();
        assert!(cache.delete(&key).await.unwrap());
        assert_eq!(cache.get(&key).await.unwrap(), None);
    }
}
