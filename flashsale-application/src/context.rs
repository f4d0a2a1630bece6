use tokio_util::sync::CancellationToken;
use ulid::Ulid;

/// 应用层上下文（Application Context）
///
/// 承载一次应用层调用所需的横切信息：
/// - 关联追踪 `correlation_id`，随日志输出；
/// - 幂等键（`idempotency_key`）：可选，由上层决定是否参与幂等；
/// - 取消令牌（`cancellation`）：触发后，进行中的重试与锁等待尽快以 `Cancelled` 结束。
///
/// 典型用法：
/// ```rust
/// use flashsale_application::context::AppContext;
///
/// let ctx = AppContext::new().with_idempotency_key("idem-xyz");
/// ctx.cancellation.cancel();
/// assert!(ctx.is_cancelled());
/// ```
#[derive(Clone, Debug)]
pub struct AppContext {
    pub correlation_id: String,
    pub idempotency_key: Option<String>,
    pub cancellation: CancellationToken,
}

impl Default for AppContext {
    fn default() -> Self {
        Self {
            correlation_id: Ulid::new().to_string(),
            idempotency_key: None,
            cancellation: CancellationToken::new(),
        }
    }
}

impl AppContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// 共享父令牌：父令牌取消时本上下文一并取消
    pub fn with_parent(mut self, parent: &CancellationToken) -> Self {
        self.cancellation = parent.child_token();
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}
