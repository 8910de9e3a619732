//! Google Gemini 探测

use crate::common::error::CheckError;
use crate::probe::client::ClientCache;
use crate::probe::{merge_metadata, sse};
use crate::types::provider::ProviderConfig;
use serde_json::json;

/// 发起最小流式生成请求
///
/// 基地址保持 `…/v1beta`，走 `streamGenerateContent` 的 SSE 形态。
pub(crate) async fn probe(clients: &ClientCache, config: &ProviderConfig) -> Result<(), CheckError> {
    let base = config
        .resolved_endpoint()
        .trim_end_matches('/')
        .to_string();

    let mut body = json!({
        "contents": [{"role": "user", "parts": [{"text": "hi"}]}],
        "generationConfig": {"maxOutputTokens": 1, "temperature": 0},
    });
    merge_metadata(&mut body, config);

    let client = clients.get(&base, &config.api_key, config.request_headers.as_ref());
    let response = client
        .post(format!(
            "{base}/models/{}:streamGenerateContent?alt=sse",
            config.model
        ))
        .header("x-goog-api-key", &config.api_key)
        .json(&body)
        .send()
        .await?;

    let response = sse::ensure_success(response).await?;
    sse::first_stream_event(response).await
}
