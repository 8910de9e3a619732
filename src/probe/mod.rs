//! 探测引擎
//!
//! 对每个目标发一次最小流式补全（1 个输出 token、用户消息 "hi"），
//! 首个流事件在截止时间内到达即算成功。探测从不向外抛错，任何失败
//! 都被编码成 `CheckResult{status: failed}`。

pub mod anthropic;
pub mod client;
pub mod gemini;
pub mod openai;
pub mod ping;
mod sse;

use crate::common::error::CheckError;
use crate::config;
use crate::types::check::CheckResult;
use crate::types::provider::{HealthStatus, ProviderConfig, ProviderType};
use chrono::Utc;
use client::ClientCache;
use futures::future::join_all;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// 超过该端到端耗时即判定 degraded（阈值本身含在 operational 内）
pub const DEGRADED_THRESHOLD_MS: i64 = 6_000;

/// 所有出站请求携带的 User-Agent
pub const USER_AGENT: &str = concat!("check-cx/", env!("CARGO_PKG_VERSION"));

/// 展示文案长度上限（字符）
const MAX_MESSAGE_CHARS: usize = 200;

/// 探测执行器
///
/// 持有客户端缓存和统一截止时间，可廉价克隆。
#[derive(Clone)]
pub struct ProbeRunner {
    clients: ClientCache,
    timeout: Duration,
}

impl ProbeRunner {
    /// 创建探测执行器（截止时间取环境配置，默认 45 秒）
    pub fn new() -> Self {
        Self::with_timeout(config::probe_timeout())
    }

    /// 指定截止时间创建
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            clients: ClientCache::new(),
            timeout,
        }
    }

    /// 并发探测一批目标
    ///
    /// 全部探测（无论成败）都落定后才返回。
    pub async fn run_all(&self, configs: &[ProviderConfig]) -> Vec<CheckResult> {
        if configs.is_empty() {
            return Vec::new();
        }
        info!(count = configs.len(), "Running provider checks");
        join_all(configs.iter().map(|config| self.probe(config))).await
    }

    /// 探测单个目标
    ///
    /// 主请求与 origin ping 并行；ping 结果无论主请求成败都附加到结果上。
    pub async fn probe(&self, config: &ProviderConfig) -> CheckResult {
        let endpoint = config.resolved_endpoint();

        let main = async {
            let started = Instant::now();
            let outcome = tokio::time::timeout(self.timeout, self.dispatch(config)).await;
            (outcome, started.elapsed().as_millis() as i64)
        };
        let ((outcome, elapsed_ms), ping_latency_ms) =
            tokio::join!(main, ping::measure_endpoint_ping(&endpoint));

        let (status, latency_ms, message) = match outcome {
            Err(_elapsed) => (HealthStatus::Failed, None, "请求超时".to_string()),
            Ok(Err(err)) => {
                debug!(
                    config_id = %config.id,
                    name = %config.name,
                    error = %err,
                    "Provider check failed"
                );
                (HealthStatus::Failed, None, failure_message(&err))
            }
            Ok(Ok(())) => classify_success(elapsed_ms),
        };

        CheckResult {
            id: config.id.clone(),
            name: config.name.clone(),
            provider_type: config.provider_type,
            endpoint: Some(endpoint),
            model: config.model.clone(),
            status,
            latency_ms,
            ping_latency_ms,
            checked_at: Utc::now(),
            message,
            group_name: config.group_name.clone(),
            official_status: None,
        }
    }

    async fn dispatch(&self, config: &ProviderConfig) -> Result<(), CheckError> {
        match config.provider_type {
            ProviderType::Openai => openai::probe(&self.clients, config).await,
            ProviderType::Gemini => gemini::probe(&self.clients, config).await,
            ProviderType::Anthropic => anthropic::probe(&self.clients, config).await,
        }
    }
}

impl Default for ProbeRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// 成功路径的状态归类（阈值 6000ms，含）
fn classify_success(elapsed_ms: i64) -> (HealthStatus, Option<i64>, String) {
    if elapsed_ms > DEGRADED_THRESHOLD_MS {
        (
            HealthStatus::Degraded,
            Some(elapsed_ms),
            format!("响应成功但耗时 {elapsed_ms}ms"),
        )
    } else {
        (
            HealthStatus::Operational,
            Some(elapsed_ms),
            format!("流式响应正常 ({elapsed_ms}ms)"),
        )
    }
}

/// 失败路径的展示文案
fn failure_message(err: &CheckError) -> String {
    let message = match err {
        CheckError::Timeout(_) => return "请求超时".to_string(),
        CheckError::Protocol(detail) => detail.clone(),
        CheckError::Transport(detail) => detail.clone(),
        other => other.to_string(),
    };
    if message.trim().is_empty() {
        "未知错误".to_string()
    } else {
        truncate_message(&message, MAX_MESSAGE_CHARS)
    }
}

/// 按字符数截断（UTF-8 安全）
fn truncate_message(message: &str, max_chars: usize) -> String {
    if message.chars().count() <= max_chars {
        return message.to_string();
    }
    message.chars().take(max_chars).collect()
}

/// 把配置的 metadata 浅合并进请求体（后写覆盖必填字段）
pub(crate) fn merge_metadata(body: &mut serde_json::Value, config: &ProviderConfig) {
    if let (Some(object), Some(metadata)) = (body.as_object_mut(), config.metadata.as_ref()) {
        for (key, value) in metadata {
            object.insert(key.clone(), value.clone());
        }
    }
}
