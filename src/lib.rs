//! check-cx
//!
//! AI 聊天补全端点的多目标健康监控：对每个配置目标周期性发起最小
//! 流式请求，维护每目标 60 条的结果环形窗口，联结服务商官方状态页，
//! 对外提供仪表盘聚合只读接口。

#![warn(missing_docs)]

/// 共享基础设施（错误类型）
pub mod common;

/// REST API 处理器
pub mod api;

/// 环境变量配置
pub mod config;

/// 仪表盘聚合
pub mod dashboard;

/// 数据库访问
pub mod db;

/// 日志初始化
pub mod logging;

/// 官方状态页轮询
pub mod official;

/// 探测引擎
pub mod probe;

/// axum 服务启动与优雅停机
pub mod server;

/// 快照服务与后台轮询
pub mod snapshot;

/// 类型定义
pub mod types;

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    /// 数据库连接池
    pub db_pool: sqlx::SqlitePool,
    /// 仪表盘聚合服务
    pub dashboard: dashboard::DashboardService,
    /// 官方状态轮询器
    pub official: official::OfficialStatusPoller,
    /// 后台轮询器
    pub background: snapshot::poller::BackgroundPoller,
}
