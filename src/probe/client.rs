//! 服务商 HTTP 客户端缓存
//!
//! 以 `(base_url, api_key, 规范化请求头)` 为键复用客户端，连接池随键隔离。

use crate::probe::USER_AGENT;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ClientKey {
    base_url: String,
    api_key: String,
    headers: Vec<(String, String)>,
}

/// 客户端缓存
#[derive(Clone, Default)]
pub struct ClientCache {
    inner: Arc<Mutex<HashMap<ClientKey, Client>>>,
}

impl ClientCache {
    /// 创建空缓存
    pub fn new() -> Self {
        Self::default()
    }

    /// 取出（或创建）该目标专用的客户端
    pub fn get(
        &self,
        base_url: &str,
        api_key: &str,
        headers: Option<&HashMap<String, String>>,
    ) -> Client {
        let key = ClientKey {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            headers: stable_headers(headers),
        };

        let mut cache = self.inner.lock().expect("client cache lock poisoned");
        cache
            .entry(key)
            .or_insert_with_key(|key| build_client(&key.headers))
            .clone()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().expect("client cache lock poisoned").len()
    }
}

/// 请求头的规范化表示（排序后参与缓存键）
fn stable_headers(headers: Option<&HashMap<String, String>>) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = headers
        .map(|map| {
            map.iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default();
    pairs.sort();
    pairs
}

fn build_client(headers: &[(String, String)]) -> Client {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(reqwest::header::USER_AGENT, HeaderValue::from_static(USER_AGENT));

    // 配置的请求头覆盖默认头
    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                default_headers.insert(name, value);
            }
            _ => {
                warn!(header = %name, "Ignoring invalid request header");
            }
        }
    }

    Client::builder()
        .default_headers(default_headers)
        .pool_max_idle_per_host(8)
        .pool_idle_timeout(Duration::from_secs(60))
        .tcp_keepalive(Duration::from_secs(30))
        .build()
        .expect("Failed to create HTTP client")
}
