//! 日志初始化

use tracing_subscriber::EnvFilter;

/// 初始化 tracing 订阅器
///
/// 过滤器取 `RUST_LOG`，未设置时默认 `info`。重复调用返回错误。
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
}
