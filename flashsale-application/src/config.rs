//! 配置管理
//!
//! 从 `FLASHSALE_*` 环境变量读取配置，存在 `.env` 文件时先行加载；未设置的项取默认值。
//!
//! | 变量 | 默认值 |
//! |------|--------|
//! | `FLASHSALE_STRATEGY` | `optimistic` |
//! | `FLASHSALE_RETRY_MAX_ATTEMPTS` | `50` |
//! | `FLASHSALE_RETRY_BASE_MS` | `10` |
//! | `FLASHSALE_RETRY_MAX_MS` | `50` |
//! | `FLASHSALE_RETRY_JITTER` | `true` |
//! | `FLASHSALE_LOCK_WAIT_MS` | `10000` |
//! | `FLASHSALE_LOCK_HOLD_MS` | `1000` |
//! | `FLASHSALE_ROW_LOCK_WAIT_MS` | `10000` |
//! | `FLASHSALE_STOCK_TTL_SECS` | `60` |
//! | `FLASHSALE_PRODUCT_TTL_SECS` | `10` |
//! | `FLASHSALE_POINT_COST` | `1000` |
//! | `FLASHSALE_PARTITIONS` | `3` |
//! | `FLASHSALE_QUEUE_CAPACITY` | `1024` |
//! | `FLASHSALE_LOG` | `info` |

use crate::error::AppError;
use crate::retry::RetryPolicy;
use flashsale_domain::cache::CacheTtl;
use flashsale_domain::lock::LockTimeouts;
use flashsale_domain::persist::DEFAULT_LOCK_WAIT;
use flashsale_domain::service::{ConcurrencyStrategy, DEFAULT_POINT_COST};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub strategy: ConcurrencyStrategy,
    pub retry: RetryPolicy,
    pub lock: LockTimeouts,
    /// 行锁（悲观读）等待上限
    pub row_lock_wait: Duration,
    pub cache_ttl: CacheTtl,
    pub point_cost: u64,
    pub partitions: usize,
    pub queue_capacity: usize,
    /// `EnvFilter` 指令，`RUST_LOG` 存在时以其为准
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            strategy: ConcurrencyStrategy::Optimistic,
            retry: RetryPolicy::default(),
            lock: LockTimeouts::default(),
            row_lock_wait: DEFAULT_LOCK_WAIT,
            cache_ttl: CacheTtl::default(),
            point_cost: DEFAULT_POINT_COST,
            partitions: 3,
            queue_capacity: 1024,
            log_filter: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// 从环境变量读取配置
    pub fn from_env() -> Result<Self, AppError> {
        // .env 文件可选，不存在时不报错
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 以任意键值来源读取配置，值无法解析时返回 `AppError::Config`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let read = Reader { lookup };

        let config = Self {
            strategy: read.parse("FLASHSALE_STRATEGY", defaults.strategy)?,
            retry: RetryPolicy {
                max_attempts: read.parse("FLASHSALE_RETRY_MAX_ATTEMPTS", defaults.retry.max_attempts)?,
                base_delay: read.millis("FLASHSALE_RETRY_BASE_MS", defaults.retry.base_delay)?,
                max_delay: read.millis("FLASHSALE_RETRY_MAX_MS", defaults.retry.max_delay)?,
                jitter: read.parse("FLASHSALE_RETRY_JITTER", defaults.retry.jitter)?,
            },
            lock: LockTimeouts {
                wait: read.millis("FLASHSALE_LOCK_WAIT_MS", defaults.lock.wait)?,
                hold: read.millis("FLASHSALE_LOCK_HOLD_MS", defaults.lock.hold)?,
            },
            row_lock_wait: read.millis("FLASHSALE_ROW_LOCK_WAIT_MS", defaults.row_lock_wait)?,
            cache_ttl: CacheTtl {
                stock: read.secs("FLASHSALE_STOCK_TTL_SECS", defaults.cache_ttl.stock)?,
                product: read.secs("FLASHSALE_PRODUCT_TTL_SECS", defaults.cache_ttl.product)?,
            },
            point_cost: read.parse("FLASHSALE_POINT_COST", defaults.point_cost)?,
            partitions: read.parse("FLASHSALE_PARTITIONS", defaults.partitions)?,
            queue_capacity: read.parse("FLASHSALE_QUEUE_CAPACITY", defaults.queue_capacity)?,
            log_filter: read.parse("FLASHSALE_LOG", defaults.log_filter)?,
        };

        if config.retry.max_attempts == 0 {
            return Err(AppError::Config("FLASHSALE_RETRY_MAX_ATTEMPTS must be at least 1".into()));
        }
        if config.partitions == 0 {
            return Err(AppError::Config("FLASHSALE_PARTITIONS must be at least 1".into()));
        }
        Ok(config)
    }
}

struct Reader<F> {
    lookup: F,
}

impl<F> Reader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn parse<T>(&self, key: &str, default: T) -> Result<T, AppError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match (self.lookup)(key) {
            Some(raw) if !raw.trim().is_empty() => raw
                .trim()
                .parse()
                .map_err(|e| AppError::Config(format!("{key}={raw}: {e}"))),
            _ => Ok(default),
        }
    }

    fn millis(&self, key: &str, default: Duration) -> Result<Duration, AppError> {
        let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
        self.parse(key, default_ms).map(Duration::from_millis)
    }

    fn secs(&self, key: &str, default: Duration) -> Result<Duration, AppError> {
        self.parse(key, default.as_secs()).map(Duration::from_secs)
    }
}
