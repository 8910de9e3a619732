//! 流式响应处理
//!
//! 探测只关心「首个流事件是否在截止时间内到达」，不消费完整流。

use crate::common::error::CheckError;
use futures::StreamExt;
use reqwest::Response;

/// 校验响应状态码
///
/// 非 2xx 时尽量取出服务商返回的 `error.message`（认证失败等场景需要原文），
/// 取不到则归为 `HTTP <code>`。
pub(crate) async fn ensure_success(response: Response) -> Result<Response, CheckError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .filter(|message| !message.trim().is_empty());

    Err(CheckError::Protocol(
        detail.unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
    ))
}

/// 等待首个流事件
///
/// 第一块字节到达即判定成功；随后丢弃流（即尽力关闭连接），不等待完整消费。
pub(crate) async fn first_stream_event(response: Response) -> Result<(), CheckError> {
    let mut stream = response.bytes_stream();
    match stream.next().await {
        Some(Ok(_chunk)) => Ok(()),
        Some(Err(err)) => Err(err.into()),
        None => Err(CheckError::Protocol("流在首个事件前结束".to_string())),
    }
}
