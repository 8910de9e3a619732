//! API 错误响应
//!
//! axum 共用错误处理：状态码取自错误分类，响应体为 `{"error": "..."}`。

use crate::common::error::CheckError;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// axum 用错误包装
#[derive(Debug)]
pub struct AppError(pub CheckError);

impl From<CheckError> for AppError {
    fn from(err: CheckError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.0.status_code();
        let payload = json!({"error": self.0.external_message()});
        (status, Json(payload)).into_response()
    }
}
