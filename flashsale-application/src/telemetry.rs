//! 日志初始化
//!
//! 优先使用 `RUST_LOG`，否则使用传入的过滤指令（如 `info,flashsale_domain=debug`）。

use crate::error::AppError;
use tracing_subscriber::EnvFilter;

/// 安装全局 fmt 订阅器；重复调用返回错误
pub fn init_tracing(default_filter: &str) -> Result<(), AppError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| AppError::Config(format!("log filter {default_filter:?}: {e}")))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .map_err(|e| AppError::Config(format!("tracing init: {e}")))
}
