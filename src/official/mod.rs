//! 官方状态页轮询
//!
//! 独立于探测循环的周期任务：抓取各服务商公开状态页，把最新结果缓存在
//! 内存里供时间线构建时联结。官方状态没有历史，每轮整体替换。

use crate::types::official::{OfficialHealthStatus, OfficialStatusResult};
use crate::types::provider::ProviderType;
use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

/// 单个服务商状态页抓取的硬超时
pub const OFFICIAL_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

const MONITORED_PROVIDERS: [ProviderType; 3] = [
    ProviderType::Openai,
    ProviderType::Gemini,
    ProviderType::Anthropic,
];

fn status_page_url(provider: ProviderType) -> &'static str {
    match provider {
        ProviderType::Openai => "https://status.openai.com/api/v2/summary.json",
        ProviderType::Gemini => "https://status.cloud.google.com/incidents.json",
        ProviderType::Anthropic => "https://status.anthropic.com/api/v2/summary.json",
    }
}

/// 官方状态轮询器
///
/// 进程级单例，由入口持有；`ensure_running` 幂等，重复调用不会再起定时器。
#[derive(Clone)]
pub struct OfficialStatusPoller {
    inner: Arc<PollerInner>,
}

struct PollerInner {
    client: Client,
    cache: RwLock<HashMap<ProviderType, OfficialStatusResult>>,
    started: AtomicBool,
    polling: AtomicBool,
    interval: Duration,
}

impl OfficialStatusPoller {
    /// 创建轮询器（不启动定时器）
    pub fn new(interval: Duration) -> Self {
        let client = Client::builder()
            .timeout(OFFICIAL_FETCH_TIMEOUT)
            .user_agent(crate::probe::USER_AGENT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            inner: Arc::new(PollerInner {
                client,
                cache: RwLock::new(HashMap::new()),
                started: AtomicBool::new(false),
                polling: AtomicBool::new(false),
                interval,
            }),
        }
    }

    /// 查询某服务商的最新官方状态（只读）
    pub fn get_official_status(&self, provider: ProviderType) -> Option<OfficialStatusResult> {
        self.inner
            .cache
            .read()
            .expect("official status cache lock poisoned")
            .get(&provider)
            .cloned()
    }

    /// 启动后台定时器（幂等）
    ///
    /// 首次调用立即异步执行一轮抓取，并按间隔循环；返回是否新启动。
    pub fn ensure_running(&self) -> bool {
        if self
            .inner
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        let poller = self.clone();
        tokio::spawn(async move {
            info!(
                interval_secs = poller.inner.interval.as_secs(),
                "Official status poller started"
            );
            poller.poll_once().await;

            let mut timer = tokio::time::interval(poller.inner.interval);
            // interval 的首个 tick 立即触发；启动轮已执行，跳过它保持节奏
            timer.tick().await;
            loop {
                timer.tick().await;
                poller.poll_once().await;
            }
        });
        true
    }

    /// 执行一轮抓取
    ///
    /// 已有一轮在执行时本次 tick 直接跳过，不排队。
    pub async fn poll_once(&self) {
        if self
            .inner
            .polling
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Official status poll already running, skipping tick");
            return;
        }

        let results = futures::future::join_all(
            MONITORED_PROVIDERS
                .iter()
                .map(|provider| async move { (*provider, self.fetch_vendor(*provider).await) }),
        )
        .await;

        {
            let mut cache = self
                .inner
                .cache
                .write()
                .expect("official status cache lock poisoned");
            for (provider, result) in results {
                cache.insert(provider, result);
            }
        }

        self.inner.polling.store(false, Ordering::SeqCst);
    }

    async fn fetch_vendor(&self, provider: ProviderType) -> OfficialStatusResult {
        let (status, message, affected_components) = match self.fetch_and_parse(provider).await {
            Ok(parts) => parts,
            Err(message) => (OfficialHealthStatus::Unknown, message, None),
        };

        OfficialStatusResult {
            status,
            message,
            checked_at: Utc::now(),
            affected_components,
        }
    }

    async fn fetch_and_parse(
        &self,
        provider: ProviderType,
    ) -> Result<(OfficialHealthStatus, String, Option<Vec<String>>), String> {
        let url = status_page_url(provider);

        let response = match tokio::time::timeout(
            OFFICIAL_FETCH_TIMEOUT,
            self.inner.client.get(url).send(),
        )
        .await
        {
            Err(_elapsed) => return Err("检查超时".to_string()),
            Ok(Err(err)) if err.is_timeout() => return Err("检查超时".to_string()),
            Ok(Err(err)) => {
                warn!(provider = %provider, error = %err, "Official status fetch failed");
                return Err("检查失败".to_string());
            }
            Ok(Ok(response)) => response,
        };

        let status_code = response.status();
        if !status_code.is_success() {
            return Err(format!("HTTP {}", status_code.as_u16()));
        }

        let body: Value = response.json().await.map_err(|err| {
            warn!(provider = %provider, error = %err, "Official status body unreadable");
            "检查失败".to_string()
        })?;

        Ok(match provider {
            ProviderType::Gemini => parse_google_incidents(&body),
            _ => parse_statuspage_summary(&body),
        })
    }
}

#[cfg(test)]
impl OfficialStatusPoller {
    /// 测试用：直接写入缓存
    pub(crate) fn set_cached(&self, provider: ProviderType, result: OfficialStatusResult) {
        self.inner
            .cache
            .write()
            .expect("official status cache lock poisoned")
            .insert(provider, result);
    }
}

/// statuspage 形态（OpenAI / Anthropic）的解析
///
/// `status.indicator` 给总体等级，逐组件状态可把等级再往上顶：
/// 含 "outage" 的组件强制 down，含 "degraded" 的至少 degraded。
fn parse_statuspage_summary(body: &Value) -> (OfficialHealthStatus, String, Option<Vec<String>>) {
    let indicator = body
        .pointer("/status/indicator")
        .and_then(Value::as_str)
        .unwrap_or("");
    let mut status = match indicator {
        "none" => OfficialHealthStatus::Operational,
        "minor" => OfficialHealthStatus::Degraded,
        "major" | "critical" => OfficialHealthStatus::Down,
        _ => OfficialHealthStatus::Unknown,
    };

    let mut message = body
        .pointer("/status/description")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let mut affected = Vec::new();
    if let Some(components) = body.get("components").and_then(Value::as_array) {
        for component in components {
            let component_status = component
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("operational");
            if component_status == "operational" {
                continue;
            }

            if component_status == "major_outage" || component_status.contains("outage") {
                status = status.at_least(OfficialHealthStatus::Down);
            } else if component_status.contains("degraded") {
                status = status.at_least(OfficialHealthStatus::Degraded);
            }

            if let Some(name) = component.get("name").and_then(Value::as_str) {
                affected.push(name.to_string());
            }
        }
    }

    if !affected.is_empty() {
        message = affected_message(&affected);
    }

    let affected = if affected.is_empty() {
        None
    } else {
        Some(affected)
    };
    (status, message, affected)
}

/// Google incidents.json 的解析
///
/// 没有 `end` 的事件视为进行中：任一 severity=high 即 down，否则 degraded。
fn parse_google_incidents(body: &Value) -> (OfficialHealthStatus, String, Option<Vec<String>>) {
    let Some(incidents) = body.as_array() else {
        return (OfficialHealthStatus::Unknown, "检查失败".to_string(), None);
    };

    let open: Vec<&Value> = incidents
        .iter()
        .filter(|incident| incident.get("end").is_none_or(Value::is_null))
        .collect();

    if open.is_empty() {
        return (
            OfficialHealthStatus::Operational,
            "暂无进行中的事件".to_string(),
            None,
        );
    }

    let any_high = open
        .iter()
        .any(|incident| incident.get("severity").and_then(Value::as_str) == Some("high"));
    let status = if any_high {
        OfficialHealthStatus::Down
    } else {
        OfficialHealthStatus::Degraded
    };

    let mut affected: Vec<String> = open
        .iter()
        .filter_map(|incident| {
            incident
                .get("service_name")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .collect();
    affected.sort();
    affected.dedup();

    let message = if affected.is_empty() {
        format!("{} 起事件进行中", open.len())
    } else {
        affected_message(&affected)
    };

    let affected = if affected.is_empty() {
        None
    } else {
        Some(affected)
    };
    (status, message, affected)
}

/// 受影响组件的展示文案（多于 3 个时折叠）
fn affected_message(affected: &[String]) -> String {
    if affected.len() > 3 {
        format!(
            "{} 等 {} 个组件 受影响",
            affected[..3].join(", "),
            affected.len()
        )
    } else {
        format!("{} 受影响", affected.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_indicator_mapping() {
        let body = json!({"status": {"indicator": "none", "description": "All Systems Operational"}});
        let (status, message, affected) = parse_statuspage_summary(&body);
        assert_eq!(status, OfficialHealthStatus::Operational);
        assert_eq!(message, "All Systems Operational");
        assert!(affected.is_none());

        let body = json!({"status": {"indicator": "minor", "description": "x"}});
        assert_eq!(
            parse_statuspage_summary(&body).0,
            OfficialHealthStatus::Degraded
        );

        let body = json!({"status": {"indicator": "critical", "description": "x"}});
        assert_eq!(
            parse_statuspage_summary(&body).0,
            OfficialHealthStatus::Down
        );
    }

    #[test]
    fn test_component_outage_forces_down() {
        let body = json!({
            "status": {"indicator": "minor", "description": "x"},
            "components": [
                {"name": "API", "status": "partial_outage"},
                {"name": "Console", "status": "operational"},
            ],
        });
        let (status, message, affected) = parse_statuspage_summary(&body);
        assert_eq!(status, OfficialHealthStatus::Down);
        assert_eq!(message, "API 受影响");
        assert_eq!(affected, Some(vec!["API".to_string()]));
    }

    #[test]
    fn test_component_degraded_raises_floor_only() {
        let body = json!({
            "status": {"indicator": "none", "description": "x"},
            "components": [{"name": "API", "status": "degraded_performance"}],
        });
        let (status, _, _) = parse_statuspage_summary(&body);
        assert_eq!(status, OfficialHealthStatus::Degraded);
    }

    #[test]
    fn test_more_than_three_components_collapsed() {
        let body = json!({
            "status": {"indicator": "major", "description": "x"},
            "components": [
                {"name": "A", "status": "major_outage"},
                {"name": "B", "status": "degraded_performance"},
                {"name": "C", "status": "partial_outage"},
                {"name": "D", "status": "under_maintenance"},
                {"name": "E", "status": "degraded_performance"},
            ],
        });
        let (_, message, affected) = parse_statuspage_summary(&body);
        assert_eq!(message, "A, B, C 等 5 个组件 受影响");
        assert_eq!(affected.map(|a| a.len()), Some(5));
    }

    #[test]
    fn test_google_incidents_all_closed() {
        let body = json!([{"end": "2026-07-01T00:00:00Z", "severity": "high"}]);
        let (status, message, affected) = parse_google_incidents(&body);
        assert_eq!(status, OfficialHealthStatus::Operational);
        assert_eq!(message, "暂无进行中的事件");
        assert!(affected.is_none());
    }

    #[test]
    fn test_google_open_high_incident_maps_to_down() {
        let body = json!([
            {"severity": "high", "service_name": "Vertex Gemini API"},
            {"end": "2026-07-01T00:00:00Z", "severity": "medium"},
        ]);
        let (status, message, affected) = parse_google_incidents(&body);
        assert_eq!(status, OfficialHealthStatus::Down);
        assert_eq!(message, "Vertex Gemini API 受影响");
        assert_eq!(affected, Some(vec!["Vertex Gemini API".to_string()]));
    }

    #[test]
    fn test_google_open_medium_incident_maps_to_degraded() {
        let body = json!([{"severity": "medium", "service_name": "Gemini API", "end": null}]);
        let (status, _, _) = parse_google_incidents(&body);
        assert_eq!(status, OfficialHealthStatus::Degraded);
    }

    #[tokio::test]
    async fn test_lookup_returns_cached_value() {
        let poller = OfficialStatusPoller::new(Duration::from_secs(300));
        assert!(poller
            .get_official_status(ProviderType::Anthropic)
            .is_none());

        let cached = OfficialStatusResult {
            status: OfficialHealthStatus::Degraded,
            message: "API 受影响".to_string(),
            checked_at: Utc::now(),
            affected_components: Some(vec!["API".to_string()]),
        };
        poller.set_cached(ProviderType::Anthropic, cached.clone());

        assert_eq!(
            poller.get_official_status(ProviderType::Anthropic),
            Some(cached)
        );
        assert!(poller.get_official_status(ProviderType::Openai).is_none());
    }

    #[tokio::test]
    async fn test_ensure_running_is_idempotent() {
        let poller = OfficialStatusPoller::new(Duration::from_secs(300));
        assert!(poller.ensure_running());
        assert!(!poller.ensure_running());
        assert!(!poller.ensure_running());
    }
}
