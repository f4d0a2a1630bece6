use crate::error::DomainError;
use crate::persist::LockMode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 并发控制策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyStrategy {
    Optimistic,
    Pessimistic,
    Hybrid,
    DistributedLock,
}

impl ConcurrencyStrategy {
    pub const ALL: [ConcurrencyStrategy; 4] = [
        ConcurrencyStrategy::Optimistic,
        ConcurrencyStrategy::Pessimistic,
        ConcurrencyStrategy::Hybrid,
        ConcurrencyStrategy::DistributedLock,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            ConcurrencyStrategy::Optimistic => "optimistic",
            ConcurrencyStrategy::Pessimistic => "pessimistic",
            ConcurrencyStrategy::Hybrid => "hybrid",
            ConcurrencyStrategy::DistributedLock => "distributed_lock",
        }
    }

    /// 该策略下三种资源的读取方式
    pub const fn lock_plan(&self) -> LockPlan {
        match self {
            ConcurrencyStrategy::Optimistic => LockPlan::OPTIMISTIC,
            ConcurrencyStrategy::Pessimistic => LockPlan::PESSIMISTIC,
            ConcurrencyStrategy::Hybrid => LockPlan::HYBRID,
            ConcurrencyStrategy::DistributedLock => LockPlan::UNLOCKED,
        }
    }

    /// 冲突只会在乐观校验下出现，只有乐观策略值得整单重试
    pub const fn retries_on_conflict(&self) -> bool {
        matches!(self, ConcurrencyStrategy::Optimistic)
    }
}

impl fmt::Display for ConcurrencyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConcurrencyStrategy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "optimistic" => Ok(ConcurrencyStrategy::Optimistic),
            "pessimistic" => Ok(ConcurrencyStrategy::Pessimistic),
            "hybrid" => Ok(ConcurrencyStrategy::Hybrid),
            "distributed_lock" | "distributed" => Ok(ConcurrencyStrategy::DistributedLock),
            other => Err(DomainError::InvalidValue {
                reason: format!("unknown concurrency strategy: {other}"),
            }),
        }
    }
}

/// 一次下单中优惠券、库存、积分各自的读取方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPlan {
    pub coupon: LockMode,
    pub stock: LockMode,
    pub point: LockMode,
}

impl LockPlan {
    pub const OPTIMISTIC: LockPlan = LockPlan::uniform(LockMode::Optimistic);
    pub const PESSIMISTIC: LockPlan = LockPlan::uniform(LockMode::Pessimistic);
    pub const HYBRID: LockPlan = LockPlan {
        coupon: LockMode::Pessimistic,
        stock: LockMode::Pessimistic,
        point: LockMode::None,
    };
    /// 外部已持有分布式锁时使用
    pub const UNLOCKED: LockPlan = LockPlan::uniform(LockMode::None);

    pub const fn uniform(mode: LockMode) -> Self {
        Self {
            coupon: mode,
            stock: mode,
            point: mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_leniently() {
        assert_eq!(
            "Distributed-Lock".parse::<ConcurrencyStrategy>().unwrap(),
            ConcurrencyStrategy::DistributedLock
        );
        for strategy in ConcurrencyStrategy::ALL {
            assert_eq!(strategy.as_str().parse::<ConcurrencyStrategy>().unwrap(), strategy);
        }
        assert!("optimistic-ish".parse::<ConcurrencyStrategy>().is_err());
    }

    #[test]
    fn hybrid_leaves_point_unlocked() {
        let plan = ConcurrencyStrategy::Hybrid.lock_plan();
        assert_eq!(plan.coupon, LockMode::Pessimistic);
        assert_eq!(plan.stock, LockMode::Pessimistic);
        assert_eq!(plan.point, LockMode::None);
    }
}
