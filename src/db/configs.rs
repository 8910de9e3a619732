//! 监控目标配置读取
//!
//! 核心对配置只读；增删改由外部维护。

use crate::types::provider::{ProviderConfig, ProviderType};
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::{error, warn};

#[derive(sqlx::FromRow)]
struct ConfigRow {
    id: String,
    name: String,
    #[sqlx(rename = "type")]
    provider_type: String,
    model: String,
    endpoint: Option<String>,
    api_key: String,
    is_maintenance: bool,
    request_header: Option<String>,
    metadata: Option<String>,
    group_name: Option<String>,
}

impl From<ConfigRow> for ProviderConfig {
    fn from(row: ConfigRow) -> Self {
        let request_headers: Option<HashMap<String, String>> =
            parse_json_column(row.request_header.as_deref(), &row.id, "request_header");
        let metadata: Option<serde_json::Map<String, serde_json::Value>> =
            parse_json_column(row.metadata.as_deref(), &row.id, "metadata");

        Self {
            provider_type: row
                .provider_type
                .parse::<ProviderType>()
                .unwrap_or_default(),
            id: row.id,
            name: row.name,
            endpoint: row.endpoint,
            model: row.model,
            api_key: row.api_key,
            is_maintenance: row.is_maintenance,
            request_headers,
            metadata,
            group_name: row.group_name,
        }
    }
}

fn parse_json_column<T: serde::de::DeserializeOwned>(
    raw: Option<&str>,
    config_id: &str,
    column: &str,
) -> Option<T> {
    let raw = raw?;
    if raw.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(
                config_id = %config_id,
                column = column,
                error = %err,
                "Ignoring malformed JSON column"
            );
            None
        }
    }
}

/// 读取全部启用的配置
///
/// 按 id 稳定排序。持久层失败时记录日志并返回空列表，不向上抛错；
/// 上游把空列表当作「无事可做」。
pub async fn load_enabled_configs(pool: &SqlitePool) -> Vec<ProviderConfig> {
    match fetch_enabled(pool).await {
        Ok(configs) => configs,
        Err(err) => {
            error!(error = %err, "Failed to load enabled configs");
            Vec::new()
        }
    }
}

async fn fetch_enabled(pool: &SqlitePool) -> Result<Vec<ProviderConfig>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ConfigRow>(
        r#"
        SELECT id, name, type, model, endpoint, api_key,
               is_maintenance, request_header, metadata, group_name
        FROM check_configs
        WHERE enabled = 1
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}
