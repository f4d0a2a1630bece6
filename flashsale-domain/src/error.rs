//! 领域层统一错误定义
//!
//! 区分“可以重试”（版本冲突）与“本单注定失败”（资源不存在、余量不足）两类，
//! 其余锁超时、取消等信号原样向上传播，由调用方决定是否重试或拒绝。
//!
use crate::model::ResourceKind;
use crate::value_object::Version;
use std::time::Duration;
use thiserror::Error;

/// 统一错误类型
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DomainError {
    // --- 业务不变式 ---
    #[error("not found: {kind} {id}")]
    NotFound { kind: ResourceKind, id: String },
    #[error("insufficient quantity: {kind} {id}, requested={requested}, available={available}")]
    InsufficientQuantity {
        kind: ResourceKind,
        id: String,
        requested: u64,
        available: u64,
    },
    #[error("insufficient balance: user {user_id}, requested={requested}, available={available}")]
    InsufficientBalance {
        user_id: String,
        requested: u64,
        available: u64,
    },
    #[error("already exists: {kind} {id}")]
    AlreadyExists { kind: ResourceKind, id: String },
    #[error("invalid value: {reason}")]
    InvalidValue { reason: String },

    // --- 并发控制 ---
    #[error("version conflict: {kind} {id}, expected={expected}, actual={actual}")]
    VersionConflict {
        kind: ResourceKind,
        id: String,
        expected: Version,
        actual: Version,
    },
    #[error("lock acquisition timeout: {resource} after {waited:?}")]
    LockAcquisitionTimeout { resource: String, waited: Duration },
    #[error("cancelled")]
    Cancelled,

    // --- 基础设施 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
    #[error("cache error: {reason}")]
    Cache { reason: String },
    #[error("publish error: {reason}")]
    Publish { reason: String },
    #[error("subscriber lagged: partition {partition}, skipped {skipped} records")]
    Lagged { partition: usize, skipped: u64 },
    #[error("repository error: {reason}")]
    Repository { reason: String },
}

impl DomainError {
    /// 仅版本冲突允许整单重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, DomainError::VersionConflict { .. })
    }

    /// 业务拒绝：无论重试多少次都不会成功
    pub fn is_business_rejection(&self) -> bool {
        matches!(
            self,
            DomainError::NotFound { .. }
                | DomainError::InsufficientQuantity { .. }
                | DomainError::InsufficientBalance { .. }
                | DomainError::AlreadyExists { .. }
        )
    }

    pub fn not_found(kind: ResourceKind, id: impl ToString) -> Self {
        DomainError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn repository(reason: impl Into<String>) -> Self {
        DomainError::Repository {
            reason: reason.into(),
        }
    }
}

/// 统一 Result 类型别名
pub type DomainResult<T> = Result<T, DomainError>;
