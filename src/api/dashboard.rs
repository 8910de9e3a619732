//! 仪表盘 API 处理器
//!
//! 两个只读端点：全局仪表盘与单分组视图。两者都以 `always` 策略触发
//! 刷新，合流与新鲜度窗口由快照服务兜底，接口层不做限流。

use super::error::AppError;
use crate::common::error::CheckError;
use crate::dashboard::{DashboardData, GroupDashboardData};
use crate::snapshot::RefreshMode;
use crate::AppState;
use axum::extract::{Path, State};
use axum::Json;

/// `GET /api/dashboard`
pub async fn get_dashboard(State(state): State<AppState>) -> Json<DashboardData> {
    let data = state
        .dashboard
        .load_dashboard_data(RefreshMode::Always)
        .await;
    Json(data)
}

/// `GET /api/group/{group_name}`
///
/// 路径参数已 URL 解码；`__ungrouped__` 选择未分组桶。
/// 分组不存在或没有任何配置时返回 404。
pub async fn get_group(
    State(state): State<AppState>,
    Path(group_name): Path<String>,
) -> Result<Json<GroupDashboardData>, AppError> {
    match state
        .dashboard
        .load_group_dashboard_data(&group_name, RefreshMode::Always)
        .await
    {
        Some(data) => Ok(Json(data)),
        None => Err(AppError(CheckError::NotFound(
            "分组不存在或没有配置".to_string(),
        ))),
    }
}
