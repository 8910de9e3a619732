//! 监控目标类型定义

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// 服务商类型
///
/// 表示被监控目标所使用的 API 协议。OpenAI 兼容网关一律归入 `Openai`。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// OpenAI 及兼容 API（/v1/chat/completions）
    #[default]
    Openai,
    /// Google Gemini（generativelanguage v1beta）
    Gemini,
    /// Anthropic（Messages API）
    Anthropic,
}

impl ProviderType {
    /// 转换为字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Gemini => "gemini",
            Self::Anthropic => "anthropic",
        }
    }

    /// 配置未指定 endpoint 时使用的默认地址
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Self::Openai => "https://api.openai.com/v1/chat/completions",
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            Self::Anthropic => "https://api.anthropic.com/v1/messages",
        }
    }
}

impl FromStr for ProviderType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "gemini" => Self::Gemini,
            "anthropic" => Self::Anthropic,
            // 未知值按 OpenAI 兼容处理
            _ => Self::Openai,
        })
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 探测结果状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// 正常（延迟 ≤ 6000ms）
    Operational,
    /// 响应成功但超过延迟阈值
    Degraded,
    /// 请求失败或超时
    #[default]
    Failed,
    /// 维护模式占位（仅由快照层合成，不落库）
    Maintenance,
}

impl HealthStatus {
    /// 转换为字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Operational => "operational",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
            Self::Maintenance => "maintenance",
        }
    }

    /// 该状态是否允许写入历史表
    ///
    /// 历史表的 CHECK 约束只接受 operational/degraded/failed。
    pub fn is_persistable(&self) -> bool {
        !matches!(self, Self::Maintenance)
    }
}

impl FromStr for HealthStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "operational" => Self::Operational,
            "degraded" => Self::Degraded,
            "maintenance" => Self::Maintenance,
            _ => Self::Failed,
        })
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 监控目标配置
///
/// 从持久层读取的目标定义。核心只读，不提供写路径。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// 稳定标识符
    pub id: String,
    /// 显示名
    pub name: String,
    /// 服务商类型
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    /// 探测地址（为空时按类型取默认地址）
    pub endpoint: Option<String>,
    /// 模型名（可携带 `@effort` / `#effort` 指令后缀）
    pub model: String,
    /// API 密钥（序列化时跳过）
    #[serde(skip_serializing)]
    pub api_key: String,
    /// 是否处于维护模式
    pub is_maintenance: bool,
    /// 额外请求头，覆盖默认头
    pub request_headers: Option<HashMap<String, String>>,
    /// 合并进请求体的额外字段
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
    /// 分组名（为空即未分组）
    pub group_name: Option<String>,
}

impl ProviderConfig {
    /// 实际探测地址
    pub fn resolved_endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| self.provider_type.default_endpoint().to_string())
    }
}
