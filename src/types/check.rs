//! 探测结果与时间线类型定义

use crate::types::official::OfficialStatusResult;
use crate::types::provider::{HealthStatus, ProviderType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 每目标历史环形窗口长度
pub const HISTORY_LIMIT: usize = 60;

/// 配置 id 到该目标历史记录（新→旧）的映射
pub type HistorySnapshot = HashMap<String, Vec<CheckResult>>;

/// 一次探测的结果，同时也是历史记录的行
///
/// 由探测器创建、追加到历史表后即不可变。
/// 对外 JSON 字段名为 camelCase，缺失值序列化为 null 而不是省略。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    /// 配置 id
    pub id: String,
    /// 显示名
    pub name: String,
    /// 服务商类型
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    /// 探测地址
    pub endpoint: Option<String>,
    /// 模型名
    pub model: String,
    /// 状态
    pub status: HealthStatus,
    /// 端到端延迟（失败/维护时为 null）
    pub latency_ms: Option<i64>,
    /// 传输层 RTT（ping 失败时为 null）
    pub ping_latency_ms: Option<i64>,
    /// 探测完成时刻
    pub checked_at: DateTime<Utc>,
    /// 展示文案
    pub message: String,
    /// 分组名
    pub group_name: Option<String>,
    /// 官方状态（仅附加在 latest 上，历史条目恒为 null）
    pub official_status: Option<OfficialStatusResult>,
}

/// 单个目标的聚合视图
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderTimeline {
    /// 配置 id
    pub id: String,
    /// 历史条目（新→旧，至多 60 条；维护目标为空）
    pub items: Vec<CheckResult>,
    /// 最新一条（维护目标为合成占位）
    pub latest: CheckResult,
}

/// 按分组聚合后的时间线
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroupedProviderTimelines {
    /// 分组名（未分组桶为 `__ungrouped__`）
    pub group_name: String,
    /// 展示名（未分组桶为「未分组」）
    pub display_name: String,
    /// 组内时间线（按 latest.name 排序）
    pub timelines: Vec<ProviderTimeline>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> CheckResult {
        CheckResult {
            id: "cfg-1".to_string(),
            name: "测试目标".to_string(),
            provider_type: ProviderType::Openai,
            endpoint: Some("https://api.openai.com/v1/chat/completions".to_string()),
            model: "gpt-4o-mini".to_string(),
            status: HealthStatus::Operational,
            latency_ms: Some(812),
            ping_latency_ms: Some(40),
            checked_at: Utc::now(),
            message: "流式响应正常 (812ms)".to_string(),
            group_name: None,
            official_status: None,
        }
    }

    #[test]
    fn test_check_result_uses_camel_case_fields() {
        let json = serde_json::to_value(sample_result()).unwrap();
        assert!(json.get("latencyMs").is_some());
        assert!(json.get("pingLatencyMs").is_some());
        assert!(json.get("checkedAt").is_some());
        assert!(json.get("groupName").is_some());
        assert_eq!(json["type"], "openai");
    }

    #[test]
    fn test_null_fields_are_emitted_not_omitted() {
        let mut result = sample_result();
        result.latency_ms = None;
        result.group_name = None;
        result.official_status = None;
        let json = serde_json::to_value(result).unwrap();
        assert!(json["latencyMs"].is_null());
        assert!(json["groupName"].is_null());
        assert!(json["officialStatus"].is_null());
    }

    #[test]
    fn test_check_result_round_trip() {
        let original = sample_result();
        let json = serde_json::to_string(&original).unwrap();
        let decoded: CheckResult = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, original);
    }
}
