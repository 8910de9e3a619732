//! OpenAI 及兼容网关探测

use crate::common::error::CheckError;
use crate::probe::client::ClientCache;
use crate::probe::{merge_metadata, sse};
use crate::types::provider::ProviderConfig;
use regex::Regex;
use serde_json::json;
use std::sync::LazyLock;

// 这些模型族即便未写指令也需要 reasoning_effort，部分兼容网关缺省会拒绝
static REASONING_MODEL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    ["codex", r"\bgpt-5", r"\bo[1-9]", "deepseek-r1", "qwq"]
        .iter()
        .map(|pattern| Regex::new(&format!("(?i){pattern}")).expect("valid pattern"))
        .collect()
});

/// 从配置 endpoint 推导基地址
///
/// 去掉结尾的 `/chat/completions`；官方主机统一规范到 `/v1`。
pub(crate) fn derive_base_url(endpoint: &str) -> String {
    let trimmed = endpoint.trim_end_matches('/');
    let base = trimmed.strip_suffix("/chat/completions").unwrap_or(trimmed);

    if let Ok(url) = reqwest::Url::parse(base) {
        if url.host_str() == Some("api.openai.com") && !base.ends_with("/v1") {
            return "https://api.openai.com/v1".to_string();
        }
    }

    base.trim_end_matches('/').to_string()
}

/// 拆出模型名里的推理力度指令
///
/// 形如 `model@high` / `model#low`，后缀取 `mini|minimal|low|medium|high`
/// 之一（不区分大小写），`mini` 规范化为 `minimal`。不匹配时原样返回，
/// 因此重复拆解是幂等的。
pub(crate) fn split_reasoning_directive(model: &str) -> (String, Option<&'static str>) {
    if let Some(pos) = model.rfind(['@', '#']) {
        let head = &model[..pos];
        let suffix = &model[pos + 1..];
        let effort = match suffix.to_ascii_lowercase().as_str() {
            "mini" | "minimal" => Some("minimal"),
            "low" => Some("low"),
            "medium" => Some("medium"),
            "high" => Some("high"),
            _ => None,
        };
        if let (Some(effort), false) = (effort, head.is_empty()) {
            return (head.to_string(), Some(effort));
        }
    }
    (model.to_string(), None)
}

/// 决定发送的模型名和 reasoning_effort
///
/// 指令优先；没有指令但命中推理模型族时取 `medium`；其余不携带该字段。
pub(crate) fn resolve_reasoning_effort(model: &str) -> (String, Option<&'static str>) {
    let (transmitted, directive) = split_reasoning_directive(model);
    if directive.is_some() {
        return (transmitted, directive);
    }
    if REASONING_MODEL_PATTERNS
        .iter()
        .any(|re| re.is_match(&transmitted))
    {
        return (transmitted, Some("medium"));
    }
    (transmitted, None)
}

/// 发起最小流式补全
pub(crate) async fn probe(clients: &ClientCache, config: &ProviderConfig) -> Result<(), CheckError> {
    let base = derive_base_url(&config.resolved_endpoint());
    let (model, effort) = resolve_reasoning_effort(&config.model);

    let mut body = json!({
        "model": model,
        "messages": [{"role": "user", "content": "hi"}],
        "max_tokens": 1,
        "temperature": 0,
        "stream": true,
    });
    if let Some(effort) = effort {
        body["reasoning_effort"] = json!(effort);
    }
    merge_metadata(&mut body, config);

    let client = clients.get(&base, &config.api_key, config.request_headers.as_ref());
    let response = client
        .post(format!("{base}/chat/completions"))
        .bearer_auth(&config.api_key)
        .json(&body)
        .send()
        .await?;

    let response = sse::ensure_success(response).await?;
    sse::first_stream_event(response).await
}
