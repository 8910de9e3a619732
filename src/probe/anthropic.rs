//! Anthropic Messages API 探测

use crate::common::error::CheckError;
use crate::probe::client::ClientCache;
use crate::probe::{merge_metadata, sse};
use crate::types::provider::ProviderConfig;
use regex::Regex;
use serde_json::json;
use std::sync::LazyLock;

/// Messages API 版本头
const ANTHROPIC_VERSION: &str = "2023-06-01";

// 传输层有时把中止上报为普通错误，只能按文案识别
static ABORT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("(?i)request was aborted").expect("valid pattern"));

/// 从配置 endpoint 推导基地址（去掉结尾的 `/v1/messages`）
pub(crate) fn derive_base_url(endpoint: &str) -> String {
    let trimmed = endpoint.trim_end_matches('/');
    trimmed
        .strip_suffix("/v1/messages")
        .unwrap_or(trimmed)
        .trim_end_matches('/')
        .to_string()
}

/// 发起最小流式消息请求
pub(crate) async fn probe(clients: &ClientCache, config: &ProviderConfig) -> Result<(), CheckError> {
    let base = derive_base_url(&config.resolved_endpoint());

    let mut body = json!({
        "model": config.model,
        "max_tokens": 1,
        "messages": [{"role": "user", "content": "hi"}],
        "stream": true,
    });
    merge_metadata(&mut body, config);

    let client = clients.get(&base, &config.api_key, config.request_headers.as_ref());
    let outcome = async {
        let response = client
            .post(format!("{base}/v1/messages"))
            .header("x-api-key", &config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;
        let response = sse::ensure_success(response).await?;
        sse::first_stream_event(response).await
    }
    .await;

    outcome.map_err(|err| {
        if ABORT_PATTERN.is_match(&err.to_string()) {
            CheckError::Timeout(err.to_string())
        } else {
            err
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_base_url_strips_messages_path() {
        assert_eq!(
            derive_base_url("https://api.anthropic.com/v1/messages"),
            "https://api.anthropic.com"
        );
        assert_eq!(
            derive_base_url("https://proxy.example.com/anthropic/v1/messages/"),
            "https://proxy.example.com/anthropic"
        );
    }

    #[test]
    fn test_derive_base_url_passthrough() {
        assert_eq!(
            derive_base_url("https://api.anthropic.com"),
            "https://api.anthropic.com"
        );
    }

    #[test]
    fn test_abort_pattern_matches_case_insensitive() {
        assert!(ABORT_PATTERN.is_match("The Request Was Aborted mid-flight"));
        assert!(!ABORT_PATTERN.is_match("connection reset by peer"));
    }
}
