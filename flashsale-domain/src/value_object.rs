//! 值对象（Value Object）
//!
//! 无标识、以值相等为准的对象。
//!
use flashsale_macros::value_object;
use std::fmt;

/// 版本号（用于乐观锁和并发控制）
///
/// 每次提交的变更都会让版本单调递增；版本不一致即说明发生了丢失更新。
///
/// ```
/// use flashsale_domain::value_object::Version;
///
/// let v1 = Version::new();
/// assert!(v1.is_new());
///
/// let v2 = v1.next();
/// assert_eq!(v2.value(), 1);
/// assert!(v2 > v1);
/// ```
#[value_object]
#[derive(Copy, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    /// 初始版本（0）
    pub const fn new() -> Self {
        Self(0)
    }

    pub const fn from_value(value: u64) -> Self {
        Self(value)
    }

    /// 下一个版本号
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }

    /// 是否从未提交过变更
    pub const fn is_new(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Self::from_value(value)
    }
}

impl From<Version> for u64 {
    fn from(version: Version) -> Self {
        version.value()
    }
}
