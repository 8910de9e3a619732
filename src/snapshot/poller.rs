//! 后台轮询
//!
//! 进程级调度器：按探测间隔无条件刷新默认 scope。读路径与定时路径共用
//! 快照服务的合流机制，天然防重入。

use crate::dashboard::DashboardService;
use crate::snapshot::RefreshMode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// 后台轮询器
///
/// 进程生命周期内至多创建一次定时器；`ensure_running` 幂等。
#[derive(Clone)]
pub struct BackgroundPoller {
    inner: Arc<PollerInner>,
}

struct PollerInner {
    started: AtomicBool,
    interval: Duration,
}

impl BackgroundPoller {
    /// 创建后台轮询器（不启动定时器）
    pub fn new(interval: Duration) -> Self {
        Self {
            inner: Arc::new(PollerInner {
                started: AtomicBool::new(false),
                interval,
            }),
        }
    }

    /// 启动定时刷新（幂等）
    ///
    /// 启动时立即执行一轮，之后按间隔触发；返回是否新启动。
    /// 每轮都重新读配置，与读请求走同一条聚合路径。
    pub fn ensure_running(&self, dashboard: DashboardService) -> bool {
        if self
            .inner
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        let interval = self.inner.interval;
        tokio::spawn(async move {
            info!(
                interval_secs = interval.as_secs(),
                "Background poller started"
            );
            let _ = dashboard.load_dashboard_data(RefreshMode::Always).await;

            let mut timer = tokio::time::interval(interval);
            // interval 的首个 tick 立即触发；启动轮已执行，跳过它保持节奏
            timer.tick().await;
            loop {
                timer.tick().await;
                let _ = dashboard.load_dashboard_data(RefreshMode::Always).await;
            }
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::history::HistoryStore;
    use crate::official::OfficialStatusPoller;
    use crate::probe::ProbeRunner;
    use crate::snapshot::SnapshotService;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn test_ensure_running_is_idempotent() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test database");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        let snapshots = SnapshotService::new(
            HistoryStore::new(pool.clone()),
            ProbeRunner::with_timeout(Duration::from_millis(200)),
            OfficialStatusPoller::new(Duration::from_secs(300)),
            Duration::from_secs(60),
        );
        let dashboard = DashboardService::new(pool, snapshots);

        let poller = BackgroundPoller::new(Duration::from_secs(60));
        assert!(poller.ensure_running(dashboard.clone()));
        assert!(!poller.ensure_running(dashboard.clone()));
        assert!(!poller.ensure_running(dashboard));
    }
}
