//! 探测历史存储
//!
//! 每个目标维护一个长度不超过 60 的环形窗口，始终按 `checked_at` 严格降序。
//! 读取和裁剪都有两条路径：主路径用窗口函数一次完成；当底层 SQLite 不支持
//! 窗口函数时（按错误文案识别），退回逐目标的等价查询。

use crate::types::check::{CheckResult, HistorySnapshot, HISTORY_LIMIT};
use crate::types::provider::{HealthStatus, ProviderType};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use tracing::{debug, error, warn};

/// 历史存储
#[derive(Clone)]
pub struct HistoryStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    config_id: String,
    status: String,
    latency_ms: Option<i64>,
    ping_latency_ms: Option<i64>,
    checked_at: String,
    message: String,
    name: String,
    provider_type: String,
    model: String,
    endpoint: Option<String>,
    group_name: Option<String>,
}

impl HistoryRow {
    fn into_check_result(self) -> Option<CheckResult> {
        let checked_at = match DateTime::parse_from_rfc3339(&self.checked_at) {
            Ok(dt) => dt.with_timezone(&Utc),
            Err(err) => {
                warn!(
                    config_id = %self.config_id,
                    checked_at = %self.checked_at,
                    error = %err,
                    "Skipping history row with unparsable timestamp"
                );
                return None;
            }
        };

        Some(CheckResult {
            id: self.config_id,
            name: self.name,
            provider_type: self
                .provider_type
                .parse::<ProviderType>()
                .unwrap_or_default(),
            endpoint: self.endpoint,
            model: self.model,
            status: self.status.parse::<HealthStatus>().unwrap_or_default(),
            latency_ms: self.latency_ms,
            ping_latency_ms: self.ping_latency_ms,
            checked_at,
            message: self.message,
            group_name: self.group_name,
            official_status: None,
        })
    }
}

/// 窗口函数缺失的识别
///
/// 老版本 SQLite 对 `ROW_NUMBER() OVER (...)` 报语法错误；其余错误一律
/// 视为普通存储故障走降级路径。
fn is_window_unsupported(err: &sqlx::Error) -> bool {
    let message = err.to_string();
    message.contains("ROW_NUMBER")
        || message.contains("window function")
        || message.contains("near \"(\"")
}

impl HistoryStore {
    /// 创建历史存储
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 读取各目标的历史窗口
    ///
    /// `allowed_ids` 为空列表时直接返回空映射，不触达存储。返回的映射只包含
    /// 至少有一条记录的 id；每个列表按 `checked_at` 降序且长度不超过 60。
    /// 存储故障记录日志并降级为空映射。
    pub async fn fetch(&self, allowed_ids: Option<&[String]>) -> HistorySnapshot {
        if let Some(ids) = allowed_ids {
            if ids.is_empty() {
                return HistorySnapshot::new();
            }
        }

        match self.fetch_window(allowed_ids).await {
            Ok(snapshot) => snapshot,
            Err(err) if is_window_unsupported(&err) => {
                debug!("Window-function fetch unavailable, using per-target fallback");
                match self.fetch_per_target(allowed_ids).await {
                    Ok(snapshot) => snapshot,
                    Err(err) => {
                        error!(error = %err, "History fetch fallback failed");
                        HistorySnapshot::new()
                    }
                }
            }
            Err(err) => {
                error!(error = %err, "History fetch failed");
                HistorySnapshot::new()
            }
        }
    }

    /// 追加一批探测结果，随后裁剪到窗口上限
    ///
    /// 批量插入在一个事务里完成：读者要么看到整批，要么一条都看不到。
    /// 插入失败只记录日志并放弃裁剪，窗口允许瞬时超限。维护占位不落库。
    pub async fn append(&self, results: &[CheckResult]) {
        let persistable: Vec<&CheckResult> = results
            .iter()
            .filter(|r| r.status.is_persistable())
            .collect();
        if persistable.is_empty() {
            return;
        }

        if let Err(err) = self.insert_batch(&persistable).await {
            error!(error = %err, count = persistable.len(), "History append failed");
            return;
        }

        self.prune(HISTORY_LIMIT).await;
    }

    /// 每个目标仅保留最近 `limit` 条，删除其余
    pub async fn prune(&self, limit: usize) {
        match self.prune_window(limit).await {
            Ok(deleted) => {
                if deleted > 0 {
                    debug!(deleted, "Pruned history rows");
                }
            }
            Err(err) if is_window_unsupported(&err) => {
                debug!("Window-function prune unavailable, using per-target fallback");
                if let Err(err) = self.prune_per_target(limit).await {
                    error!(error = %err, "History prune fallback failed");
                }
            }
            Err(err) => {
                error!(error = %err, "History prune failed");
            }
        }
    }

    async fn insert_batch(&self, results: &[&CheckResult]) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        for result in results {
            sqlx::query(
                r#"
                INSERT INTO check_history
                    (config_id, status, latency_ms, ping_latency_ms, checked_at, message)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&result.id)
            .bind(result.status.as_str())
            .bind(result.latency_ms)
            .bind(result.ping_latency_ms)
            .bind(result.checked_at.to_rfc3339_opts(SecondsFormat::Micros, true))
            .bind(&result.message)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }

    async fn fetch_window(
        &self,
        allowed_ids: Option<&[String]>,
    ) -> Result<HistorySnapshot, sqlx::Error> {
        let mut sql = String::from(
            r#"
            SELECT h.config_id, h.status, h.latency_ms, h.ping_latency_ms,
                   h.checked_at, h.message,
                   c.name, c.type AS provider_type, c.model, c.endpoint, c.group_name
            FROM (
                SELECT config_id, status, latency_ms, ping_latency_ms, checked_at, message,
                       ROW_NUMBER() OVER (
                           PARTITION BY config_id
                           ORDER BY checked_at DESC, id DESC
                       ) AS rn
                FROM check_history
            ) h
            JOIN check_configs c ON c.id = h.config_id
            WHERE h.rn <= ?
            "#,
        );
        if let Some(ids) = allowed_ids {
            let placeholders = vec!["?"; ids.len()].join(", ");
            sql.push_str(&format!(" AND h.config_id IN ({placeholders})"));
        }
        sql.push_str(" ORDER BY h.config_id, h.rn");

        let mut query = sqlx::query_as::<_, HistoryRow>(&sql).bind(HISTORY_LIMIT as i64);
        if let Some(ids) = allowed_ids {
            for id in ids {
                query = query.bind(id);
            }
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(Self::collect_snapshot(rows))
    }

    async fn fetch_per_target(
        &self,
        allowed_ids: Option<&[String]>,
    ) -> Result<HistorySnapshot, sqlx::Error> {
        let target_ids: Vec<String> = match allowed_ids {
            Some(ids) => ids.to_vec(),
            None => {
                sqlx::query_scalar::<_, String>("SELECT DISTINCT config_id FROM check_history")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut rows = Vec::new();
        for id in &target_ids {
            let mut page = sqlx::query_as::<_, HistoryRow>(
                r#"
                SELECT h.config_id, h.status, h.latency_ms, h.ping_latency_ms,
                       h.checked_at, h.message,
                       c.name, c.type AS provider_type, c.model, c.endpoint, c.group_name
                FROM check_history h
                JOIN check_configs c ON c.id = h.config_id
                WHERE h.config_id = ?
                ORDER BY h.checked_at DESC, h.id DESC
                LIMIT ?
                "#,
            )
            .bind(id)
            .bind(HISTORY_LIMIT as i64)
            .fetch_all(&self.pool)
            .await?;
            rows.append(&mut page);
        }

        Ok(Self::collect_snapshot(rows))
    }

    fn collect_snapshot(rows: Vec<HistoryRow>) -> HistorySnapshot {
        let mut snapshot = HistorySnapshot::new();
        for row in rows {
            if let Some(result) = row.into_check_result() {
                snapshot.entry(result.id.clone()).or_default().push(result);
            }
        }
        for items in snapshot.values_mut() {
            items.sort_by(|a, b| b.checked_at.cmp(&a.checked_at));
            items.truncate(HISTORY_LIMIT);
        }
        snapshot
    }

    async fn prune_window(&self, limit: usize) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM check_history
            WHERE id IN (
                SELECT id FROM (
                    SELECT id,
                           ROW_NUMBER() OVER (
                               PARTITION BY config_id
                               ORDER BY checked_at DESC, id DESC
                           ) AS rn
                    FROM check_history
                )
                WHERE rn > ?
            )
            "#,
        )
        .bind(limit as i64)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn prune_per_target(&self, limit: usize) -> Result<(), sqlx::Error> {
        let target_ids: Vec<String> =
            sqlx::query_scalar::<_, String>("SELECT DISTINCT config_id FROM check_history")
                .fetch_all(&self.pool)
                .await?;

        for id in &target_ids {
            sqlx::query(
                r#"
                DELETE FROM check_history
                WHERE config_id = ?
                  AND id NOT IN (
                      SELECT id FROM check_history
                      WHERE config_id = ?
                      ORDER BY checked_at DESC, id DESC
                      LIMIT ?
                  )
                "#,
            )
            .bind(id)
            .bind(id)
            .bind(limit as i64)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test database");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");
        pool
    }

    async fn insert_config(pool: &SqlitePool, id: &str) {
        sqlx::query(
            r#"
            INSERT INTO check_configs (id, name, type, model, endpoint, api_key, enabled, is_maintenance)
            VALUES (?, ?, 'openai', 'gpt-4o-mini', NULL, 'sk-test', 1, 0)
            "#,
        )
        .bind(id)
        .bind(format!("目标 {id}"))
        .execute(pool)
        .await
        .expect("insert config");
    }

    fn result_at(id: &str, checked_at: DateTime<Utc>, latency_ms: i64) -> CheckResult {
        CheckResult {
            id: id.to_string(),
            name: format!("目标 {id}"),
            provider_type: ProviderType::Openai,
            endpoint: None,
            model: "gpt-4o-mini".to_string(),
            status: HealthStatus::Operational,
            latency_ms: Some(latency_ms),
            ping_latency_ms: Some(40),
            checked_at,
            message: format!("流式响应正常 ({latency_ms}ms)"),
            group_name: None,
            official_status: None,
        }
    }

    #[tokio::test]
    async fn test_fetch_with_empty_allowed_ids_short_circuits() {
        let pool = memory_pool().await;
        let store = HistoryStore::new(pool);

        let snapshot = store.fetch(Some(&[])).await;
        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn test_append_then_fetch_sorted_descending() {
        let pool = memory_pool().await;
        insert_config(&pool, "a").await;
        let store = HistoryStore::new(pool);

        let base = Utc::now();
        let results: Vec<CheckResult> = (0..5)
            .map(|i| result_at("a", base - Duration::seconds(i * 60), 800 + i))
            .collect();
        store.append(&results).await;

        let snapshot = store.fetch(None).await;
        let items = snapshot.get("a").expect("history for a");
        assert_eq!(items.len(), 5);
        for pair in items.windows(2) {
            assert!(pair[0].checked_at > pair[1].checked_at);
        }
        // 配置元数据已联结
        assert_eq!(items[0].name, "目标 a");
        assert_eq!(items[0].provider_type, ProviderType::Openai);
    }

    #[tokio::test]
    async fn test_61st_append_evicts_oldest() {
        let pool = memory_pool().await;
        insert_config(&pool, "a").await;
        let store = HistoryStore::new(pool);

        let base = Utc::now();
        let results: Vec<CheckResult> = (0..61)
            .map(|i| result_at("a", base - Duration::seconds(i * 60), 800))
            .collect();
        store.append(&results).await;

        let snapshot = store.fetch(None).await;
        let items = snapshot.get("a").expect("history for a");
        assert_eq!(items.len(), HISTORY_LIMIT);
        // 最旧的一条（base - 60 分钟）已被裁掉
        let oldest_expected = base - Duration::seconds(59 * 60);
        let oldest_kept = items.last().expect("non-empty").checked_at;
        assert_eq!(
            oldest_kept.timestamp_micros(),
            oldest_expected.timestamp_micros()
        );
    }

    #[tokio::test]
    async fn test_maintenance_results_never_persisted() {
        let pool = memory_pool().await;
        insert_config(&pool, "a").await;
        let store = HistoryStore::new(pool);

        let mut maintenance = result_at("a", Utc::now(), 0);
        maintenance.status = HealthStatus::Maintenance;
        maintenance.latency_ms = None;
        store.append(&[maintenance]).await;

        let snapshot = store.fetch(None).await;
        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_scoped_to_allowed_ids() {
        let pool = memory_pool().await;
        insert_config(&pool, "a").await;
        insert_config(&pool, "b").await;
        let store = HistoryStore::new(pool);

        let now = Utc::now();
        store
            .append(&[result_at("a", now, 800), result_at("b", now, 900)])
            .await;

        let allowed = vec!["a".to_string()];
        let snapshot = store.fetch(Some(&allowed)).await;
        assert!(snapshot.contains_key("a"));
        assert!(!snapshot.contains_key("b"));
    }

    #[tokio::test]
    async fn test_fallback_paths_match_primary() {
        let pool = memory_pool().await;
        insert_config(&pool, "a").await;
        let store = HistoryStore::new(pool.clone());

        let base = Utc::now();
        let results: Vec<CheckResult> = (0..3)
            .map(|i| result_at("a", base - Duration::seconds(i * 60), 800))
            .collect();
        store.append(&results).await;

        let primary = store.fetch(None).await;
        let fallback = store.fetch_per_target(None).await.expect("fallback fetch");
        assert_eq!(primary, fallback);

        store.prune_per_target(2).await.expect("fallback prune");
        let pruned = store.fetch(None).await;
        assert_eq!(pruned.get("a").map(Vec::len), Some(2));
    }
}
