//! 环境变量配置
//!
//! 沿用「新变量名优先、旧变量名告警回退」的读取方式。

use std::time::Duration;

/// 探测轮询间隔下限（秒）
pub const MIN_POLL_INTERVAL_SECS: u64 = 15;
/// 探测轮询间隔上限（秒）
pub const MAX_POLL_INTERVAL_SECS: u64 = 600;
/// 探测轮询间隔默认值（秒）
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// 官方状态轮询间隔默认值（秒，分钟级）
pub const DEFAULT_OFFICIAL_POLL_INTERVAL_SECS: u64 = 300;

/// 单次探测默认截止时间（秒）
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 45;

/// 读取环境变量，支持旧变量名回退
///
/// 新变量名存在时直接返回；只有旧变量名存在时返回其值并输出弃用告警。
pub fn get_env_with_fallback(new_name: &str, old_name: &str) -> Option<String> {
    if let Ok(val) = std::env::var(new_name) {
        return Some(val);
    }
    if let Ok(val) = std::env::var(old_name) {
        tracing::warn!(
            "Environment variable '{}' is deprecated, use '{}' instead",
            old_name,
            new_name
        );
        return Some(val);
    }
    None
}

/// 读取环境变量，未设置时返回默认值
pub fn get_env_with_fallback_or(new_name: &str, old_name: &str, default: &str) -> String {
    get_env_with_fallback(new_name, old_name).unwrap_or_else(|| default.to_string())
}

/// 读取并解析环境变量，未设置或解析失败时返回默认值
pub fn get_env_with_fallback_parse<T: std::str::FromStr>(
    new_name: &str,
    old_name: &str,
    default: T,
) -> T {
    get_env_with_fallback(new_name, old_name)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// 探测轮询间隔
///
/// 环境变量 `CHECK_POLL_INTERVAL_SECONDS`，默认 60 秒，夹取到 [15, 600]。
pub fn poll_interval() -> Duration {
    let secs: u64 = get_env_with_fallback_parse(
        "CHECK_POLL_INTERVAL_SECONDS",
        "POLL_INTERVAL_SECONDS",
        DEFAULT_POLL_INTERVAL_SECS,
    );
    Duration::from_secs(secs.clamp(MIN_POLL_INTERVAL_SECS, MAX_POLL_INTERVAL_SECS))
}

/// 官方状态轮询间隔
///
/// 环境变量 `CHECK_OFFICIAL_POLL_INTERVAL_SECONDS`，默认 300 秒，
/// 与探测间隔相互独立。
pub fn official_poll_interval() -> Duration {
    let secs: u64 = get_env_with_fallback_parse(
        "CHECK_OFFICIAL_POLL_INTERVAL_SECONDS",
        "OFFICIAL_POLL_INTERVAL_SECONDS",
        DEFAULT_OFFICIAL_POLL_INTERVAL_SECS,
    );
    Duration::from_secs(secs.clamp(60, 3600))
}

/// 单次探测截止时间
///
/// 环境变量 `CHECK_PROBE_TIMEOUT_SECONDS`，默认 45 秒。
pub fn probe_timeout() -> Duration {
    let secs: u64 = get_env_with_fallback_parse(
        "CHECK_PROBE_TIMEOUT_SECONDS",
        "PROBE_TIMEOUT_SECONDS",
        DEFAULT_PROBE_TIMEOUT_SECS,
    );
    Duration::from_secs(secs.max(1))
}

/// 轮询间隔的展示文案
///
/// 整分钟显示「N 分钟」，否则显示「N 秒」。
pub fn poll_interval_label(interval: Duration) -> String {
    let secs = interval.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        format!("{} 分钟", secs / 60)
    } else {
        format!("{} 秒", secs)
    }
}
