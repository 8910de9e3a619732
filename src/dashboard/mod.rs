//! 仪表盘聚合
//!
//! 读配置 → 拆分活跃/维护 → 取快照 → 组装时间线与分组视图。
//! 分组刷新使用独立缓存键，与全局仪表盘的合流车道互不干扰。

use crate::config;
use crate::db::configs;
use crate::snapshot::{locale_key, RefreshMode, Scope, SnapshotService};
use crate::types::check::{GroupedProviderTimelines, ProviderTimeline};
use crate::types::provider::ProviderConfig;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::BTreeMap;

/// 未分组桶的分组名
pub const UNGROUPED_SENTINEL: &str = "__ungrouped__";
/// 未分组桶的展示名
pub const UNGROUPED_DISPLAY_NAME: &str = "未分组";

/// 仪表盘响应
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    /// 全部时间线（按 latest.name 排序）
    pub provider_timelines: Vec<ProviderTimeline>,
    /// 分组视图（命名分组字典序，未分组桶最后）
    pub grouped_timelines: Vec<GroupedProviderTimelines>,
    /// 全部条目中最新的 checkedAt
    pub last_updated: Option<DateTime<Utc>>,
    /// 启用配置总数
    pub total: usize,
    /// 轮询间隔展示文案
    pub poll_interval_label: String,
    /// 轮询间隔（毫秒）
    pub poll_interval_ms: i64,
    /// 聚合完成时刻
    pub generated_at: DateTime<Utc>,
}

/// 分组仪表盘响应
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDashboardData {
    /// 分组名（未分组桶为 `__ungrouped__`）
    pub group_name: String,
    /// 展示名
    pub display_name: String,
    /// 组内时间线
    pub provider_timelines: Vec<ProviderTimeline>,
    /// 组内最新的 checkedAt
    pub last_updated: Option<DateTime<Utc>>,
    /// 组内配置总数
    pub total: usize,
    /// 轮询间隔展示文案
    pub poll_interval_label: String,
    /// 轮询间隔（毫秒）
    pub poll_interval_ms: i64,
    /// 聚合完成时刻
    pub generated_at: DateTime<Utc>,
}

/// 仪表盘聚合服务
#[derive(Clone)]
pub struct DashboardService {
    pool: SqlitePool,
    snapshots: SnapshotService,
}

impl DashboardService {
    /// 创建聚合服务
    pub fn new(pool: SqlitePool, snapshots: SnapshotService) -> Self {
        Self { pool, snapshots }
    }

    fn poll_interval_ms(&self) -> i64 {
        self.snapshots.poll_interval().as_millis() as i64
    }

    /// 全局仪表盘数据
    ///
    /// 配置读取失败会退化为空仪表盘（total = 0），不报错。
    pub async fn load_dashboard_data(&self, mode: RefreshMode) -> DashboardData {
        let all = configs::load_enabled_configs(&self.pool).await;
        let total = all.len();
        let (maintenance, active): (Vec<_>, Vec<_>) =
            all.into_iter().partition(|c| c.is_maintenance);

        let scope = Scope {
            cache_key: dashboard_cache_key(self.poll_interval_ms(), &active),
            configs: active,
        };
        let snapshot = self.snapshots.load_snapshot(&scope, mode).await;
        let timelines = self.snapshots.build_provider_timelines(&snapshot, &maintenance);
        let grouped = group_timelines(&timelines);
        let last_updated = newest_checked_at(&timelines);

        DashboardData {
            provider_timelines: timelines,
            grouped_timelines: grouped,
            last_updated,
            total,
            poll_interval_label: config::poll_interval_label(self.snapshots.poll_interval()),
            poll_interval_ms: self.poll_interval_ms(),
            generated_at: Utc::now(),
        }
    }

    /// 单个分组的数据
    ///
    /// `__ungrouped__` 选择未设置分组名的配置；没有任何匹配配置时返回 None。
    pub async fn load_group_dashboard_data(
        &self,
        group_name: &str,
        mode: RefreshMode,
    ) -> Option<GroupDashboardData> {
        let all = configs::load_enabled_configs(&self.pool).await;
        let matching: Vec<ProviderConfig> = all
            .into_iter()
            .filter(|c| matches_group(c, group_name))
            .collect();
        if matching.is_empty() {
            return None;
        }

        let total = matching.len();
        let (maintenance, active): (Vec<_>, Vec<_>) =
            matching.into_iter().partition(|c| c.is_maintenance);

        let scope = Scope {
            cache_key: group_cache_key(group_name, self.poll_interval_ms(), &active),
            configs: active,
        };
        let snapshot = self.snapshots.load_snapshot(&scope, mode).await;
        let timelines = self.snapshots.build_provider_timelines(&snapshot, &maintenance);
        let last_updated = newest_checked_at(&timelines);

        let display_name = if group_name == UNGROUPED_SENTINEL {
            UNGROUPED_DISPLAY_NAME.to_string()
        } else {
            group_name.to_string()
        };

        Some(GroupDashboardData {
            group_name: group_name.to_string(),
            display_name,
            provider_timelines: timelines,
            last_updated,
            total,
            poll_interval_label: config::poll_interval_label(self.snapshots.poll_interval()),
            poll_interval_ms: self.poll_interval_ms(),
            generated_at: Utc::now(),
        })
    }
}

fn matches_group(config: &ProviderConfig, group_name: &str) -> bool {
    if group_name == UNGROUPED_SENTINEL {
        config.group_name.is_none()
    } else {
        config.group_name.as_deref() == Some(group_name)
    }
}

fn sorted_ids(configs: &[ProviderConfig]) -> Vec<String> {
    let mut ids: Vec<String> = configs.iter().map(|c| c.id.clone()).collect();
    ids.sort();
    ids
}

fn dashboard_cache_key(interval_ms: i64, active: &[ProviderConfig]) -> String {
    let ids = sorted_ids(active);
    if ids.is_empty() {
        format!("dashboard:{interval_ms}:__empty__")
    } else {
        format!("dashboard:{interval_ms}:{}", ids.join("|"))
    }
}

fn group_cache_key(group_name: &str, interval_ms: i64, active: &[ProviderConfig]) -> String {
    let ids = sorted_ids(active);
    if ids.is_empty() {
        format!("group:{group_name}:{interval_ms}:__empty__")
    } else {
        format!("group:{group_name}:{interval_ms}:{}", ids.join("|"))
    }
}

fn newest_checked_at(timelines: &[ProviderTimeline]) -> Option<DateTime<Utc>> {
    timelines
        .iter()
        .flat_map(|t| t.items.iter())
        .map(|item| item.checked_at)
        .max()
}

/// 按分组名聚合时间线
///
/// 命名分组按字典序（大小写不敏感）排列，未分组桶有内容时排在最后；
/// 组内沿用全局的 name 排序。
fn group_timelines(timelines: &[ProviderTimeline]) -> Vec<GroupedProviderTimelines> {
    let mut named: BTreeMap<(String, String), Vec<ProviderTimeline>> = BTreeMap::new();
    let mut ungrouped: Vec<ProviderTimeline> = Vec::new();

    for timeline in timelines {
        match &timeline.latest.group_name {
            Some(group) => named
                .entry(locale_key(group))
                .or_default()
                .push(timeline.clone()),
            None => ungrouped.push(timeline.clone()),
        }
    }

    let mut groups: Vec<GroupedProviderTimelines> = named
        .into_values()
        .map(|timelines| {
            let group_name = timelines[0]
                .latest
                .group_name
                .clone()
                .unwrap_or_else(|| UNGROUPED_SENTINEL.to_string());
            GroupedProviderTimelines {
                display_name: group_name.clone(),
                group_name,
                timelines,
            }
        })
        .collect();

    if !ungrouped.is_empty() {
        groups.push(GroupedProviderTimelines {
            group_name: UNGROUPED_SENTINEL.to_string(),
            display_name: UNGROUPED_DISPLAY_NAME.to_string(),
            timelines: ungrouped,
        });
    }

    groups
}
