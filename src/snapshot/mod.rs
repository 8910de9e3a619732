//! 快照服务
//!
//! 读路径的编排层：按 scope 做请求合流（同一 scope 任意时刻至多一个
//! 刷新在途），辅以新鲜度窗口避免探测风暴；并把历史、维护占位和官方
//! 状态组装成时间线。

pub mod poller;

use crate::db::history::HistoryStore;
use crate::official::OfficialStatusPoller;
use crate::probe::ProbeRunner;
use crate::types::check::{CheckResult, HistorySnapshot, ProviderTimeline, HISTORY_LIMIT};
use crate::types::provider::{HealthStatus, ProviderConfig};
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::error;

/// 刷新策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// 无条件进入刷新路径
    Always,
    /// 仅当存量历史为空时刷新
    Missing,
    /// 只读，不触发探测
    Never,
}

/// 一条合流车道：缓存键加上参与探测的启用配置
#[derive(Debug, Clone)]
pub struct Scope {
    /// 缓存键
    pub cache_key: String,
    /// 活跃（非维护）配置
    pub configs: Vec<ProviderConfig>,
}

impl Scope {
    /// scope 内的配置 id 列表
    pub fn ids(&self) -> Vec<String> {
        self.configs.iter().map(|c| c.id.clone()).collect()
    }
}

type SharedRefresh = Shared<BoxFuture<'static, Arc<HistorySnapshot>>>;

#[derive(Default)]
struct ScopeEntry {
    last_ping_at: Option<Instant>,
    history: Option<Arc<HistorySnapshot>>,
    inflight: Option<SharedRefresh>,
    generation: u64,
}

/// 快照服务
#[derive(Clone)]
pub struct SnapshotService {
    history: HistoryStore,
    probes: ProbeRunner,
    official: OfficialStatusPoller,
    entries: Arc<Mutex<HashMap<String, ScopeEntry>>>,
    poll_interval: Duration,
}

impl SnapshotService {
    /// 创建快照服务
    pub fn new(
        history: HistoryStore,
        probes: ProbeRunner,
        official: OfficialStatusPoller,
        poll_interval: Duration,
    ) -> Self {
        Self {
            history,
            probes,
            official,
            entries: Arc::new(Mutex::new(HashMap::new())),
            poll_interval,
        }
    }

    /// 探测轮询间隔
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// 读取某 scope 的历史快照
    ///
    /// 活跃 id 为空时直接返回空映射，不触达网络。刷新路径内部保证
    /// 同一 scope 至多一个在途刷新，并发读者共享同一份结果。
    pub async fn load_snapshot(&self, scope: &Scope, mode: RefreshMode) -> Arc<HistorySnapshot> {
        if scope.configs.is_empty() {
            return Arc::new(HistorySnapshot::new());
        }

        match mode {
            RefreshMode::Never => Arc::new(self.history.fetch(Some(&scope.ids())).await),
            RefreshMode::Missing => {
                let stored = self.history.fetch(Some(&scope.ids())).await;
                if stored.is_empty() {
                    self.refresh_path(scope).await
                } else {
                    Arc::new(stored)
                }
            }
            RefreshMode::Always => self.refresh_path(scope).await,
        }
    }

    /// 刷新路径
    ///
    /// 已有在途刷新时挂上去等它；否则若缓存仍在新鲜度窗口内直接返回；
    /// 再否则安装一个新的在途刷新。
    async fn refresh_path(&self, scope: &Scope) -> Arc<HistorySnapshot> {
        let shared = {
            let mut entries = self.entries.lock().await;
            let entry = entries.entry(scope.cache_key.clone()).or_default();

            if let Some(inflight) = entry.inflight.clone() {
                inflight
            } else {
                let fresh = entry.last_ping_at.is_some_and(|at| at.elapsed() < self.poll_interval);
                if fresh {
                    if let Some(history) = entry.history.clone() {
                        return history;
                    }
                }
                self.install_refresh(entry, scope)
            }
        };
        shared.await
    }

    /// 安装在途刷新（调用方持有 entries 锁）
    ///
    /// 刷新本体跑在独立任务上，不随发起方的取消而中断；完成时回写
    /// history/last_ping_at 并清掉自己的 inflight（按代数判断，避免
    /// 清掉后装入的新刷新）。
    fn install_refresh(&self, entry: &mut ScopeEntry, scope: &Scope) -> SharedRefresh {
        entry.generation += 1;
        let generation = entry.generation;

        let service = self.clone();
        let scope = scope.clone();
        let key = scope.cache_key.clone();
        let handle = tokio::spawn(async move {
            let snapshot = service.run_refresh(&scope).await;

            let mut entries = service.entries.lock().await;
            if let Some(entry) = entries.get_mut(&key) {
                entry.history = Some(snapshot.clone());
                entry.last_ping_at = Some(Instant::now());
                if entry.generation == generation {
                    entry.inflight = None;
                }
            }
            snapshot
        });

        let shared: SharedRefresh = async move {
            match handle.await {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    error!(error = %err, "Snapshot refresh task failed");
                    Arc::new(HistorySnapshot::new())
                }
            }
        }
        .boxed()
        .shared();

        entry.inflight = Some(shared.clone());
        shared
    }

    /// 执行一轮刷新：并发探测 → 批量落库 → 回读 scoped 历史
    async fn run_refresh(&self, scope: &Scope) -> Arc<HistorySnapshot> {
        let results = self.probes.run_all(&scope.configs).await;
        self.history.append(&results).await;
        Arc::new(self.history.fetch(Some(&scope.ids())).await)
    }

    /// 组装时间线
    ///
    /// 有历史的目标取最新一条为 latest 并联结官方状态；维护配置无视
    /// 历史，合成占位 latest 且 items 为空。结果按 latest.name 排序。
    pub fn build_provider_timelines(
        &self,
        history: &HistorySnapshot,
        maintenance_configs: &[ProviderConfig],
    ) -> Vec<ProviderTimeline> {
        let maintenance_ids: HashSet<&str> =
            maintenance_configs.iter().map(|c| c.id.as_str()).collect();

        let mut timelines = Vec::new();
        for (id, records) in history {
            if records.is_empty() || maintenance_ids.contains(id.as_str()) {
                continue;
            }
            let mut items = records.clone();
            items.sort_by(|a, b| b.checked_at.cmp(&a.checked_at));
            items.truncate(HISTORY_LIMIT);

            let mut latest = items[0].clone();
            latest.official_status = self.official.get_official_status(latest.provider_type);

            timelines.push(ProviderTimeline {
                id: id.clone(),
                items,
                latest,
            });
        }

        for config in maintenance_configs {
            timelines.push(ProviderTimeline {
                id: config.id.clone(),
                items: Vec::new(),
                latest: maintenance_placeholder(config),
            });
        }

        timelines.sort_by_cached_key(|t| locale_key(&t.latest.name));
        timelines
    }
}

/// 排序键：大小写不敏感、Unicode 感知，原文作平局决胜
pub(crate) fn locale_key(name: &str) -> (String, String) {
    (name.to_lowercase(), name.to_string())
}

fn maintenance_placeholder(config: &ProviderConfig) -> CheckResult {
    CheckResult {
        id: config.id.clone(),
        name: config.name.clone(),
        provider_type: config.provider_type,
        endpoint: Some(config.resolved_endpoint()),
        model: config.model.clone(),
        status: HealthStatus::Maintenance,
        latency_ms: None,
        ping_latency_ms: None,
        checked_at: Utc::now(),
        message: "配置处于维护模式".to_string(),
        group_name: config.group_name.clone(),
        official_status: None,
    }
}
