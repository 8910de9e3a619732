//! 官方状态页类型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 官方状态页上报的健康等级
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OfficialHealthStatus {
    /// 全部正常
    Operational,
    /// 部分降级
    Degraded,
    /// 重大故障
    Down,
    /// 无法获取或无法解析
    #[default]
    Unknown,
}

impl OfficialHealthStatus {
    /// 转换为字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Operational => "operational",
            Self::Degraded => "degraded",
            Self::Down => "down",
            Self::Unknown => "unknown",
        }
    }

    /// 严重度序（用于组件状态提升比较）
    pub(crate) fn severity(&self) -> u8 {
        match self {
            Self::Operational | Self::Unknown => 0,
            Self::Degraded => 1,
            Self::Down => 2,
        }
    }

    /// 不低于 `floor` 的状态
    pub(crate) fn at_least(self, floor: Self) -> Self {
        if floor.severity() > self.severity() {
            floor
        } else {
            self
        }
    }
}

impl FromStr for OfficialHealthStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "operational" => Self::Operational,
            "degraded" => Self::Degraded,
            "down" => Self::Down,
            _ => Self::Unknown,
        })
    }
}

impl std::fmt::Display for OfficialHealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 官方状态页一次轮询的结果
///
/// 每个服务商类型在内存中只保留最新一份，轮询时整体替换。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OfficialStatusResult {
    /// 健康等级
    pub status: OfficialHealthStatus,
    /// 展示文案
    pub message: String,
    /// 轮询时刻
    pub checked_at: DateTime<Utc>,
    /// 受影响组件名（无异常组件时为空）
    pub affected_components: Option<Vec<String>>,
}
