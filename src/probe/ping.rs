//! 传输层 RTT 测量
//!
//! 对目标地址的 origin 发起一次轻量请求，与主探测并行执行。

use crate::probe::USER_AGENT;
use reqwest::redirect;
use reqwest::Client;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

/// 单次 ping 的硬超时
pub const PING_TIMEOUT: Duration = Duration::from_secs(8);

// 不跟随重定向、不读响应体；任何 HTTP 响应都算一次完整往返
static PING_CLIENT: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .redirect(redirect::Policy::none())
        .timeout(PING_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .expect("Failed to create ping client")
});

/// 测量到目标 origin 的往返时间（毫秒）
///
/// 先发 HEAD，失败或超时后退回 GET；两者都失败或 URL 无法解析时返回 None。
/// 该函数从不报错，响应体一律丢弃。
pub async fn measure_endpoint_ping(endpoint: &str) -> Option<i64> {
    let origin = origin_of(endpoint)?;

    let started = Instant::now();
    if PING_CLIENT.head(&origin).send().await.is_ok() {
        return Some(started.elapsed().as_millis() as i64);
    }

    let started = Instant::now();
    match PING_CLIENT.get(&origin).send().await {
        Ok(_) => Some(started.elapsed().as_millis() as i64),
        Err(_) => None,
    }
}

/// 从 URL 提取 `scheme://host[:port]`
fn origin_of(endpoint: &str) -> Option<String> {
    let url = reqwest::Url::parse(endpoint).ok()?;
    let host = url.host_str()?;
    let mut origin = format!("{}://{}", url.scheme(), host);
    if let Some(port) = url.port() {
        origin.push_str(&format!(":{port}"));
    }
    Some(origin)
}
