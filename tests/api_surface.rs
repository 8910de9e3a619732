//! HTTP 只读接口集成测试

use check_cx::db::history::HistoryStore;
use check_cx::official::OfficialStatusPoller;
use check_cx::probe::ProbeRunner;
use check_cx::snapshot::poller::BackgroundPoller;
use check_cx::snapshot::SnapshotService;
use check_cx::{api, dashboard, AppState};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::net::SocketAddr;
use std::time::Duration;

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

/// 起一个监听临时端口的完整应用（不启动后台轮询）
async fn spawn_app(pool: SqlitePool) -> SocketAddr {
    let snapshots = SnapshotService::new(
        HistoryStore::new(pool.clone()),
        ProbeRunner::with_timeout(Duration::from_millis(500)),
        OfficialStatusPoller::new(Duration::from_secs(300)),
        Duration::from_secs(60),
    );
    let dashboard = dashboard::DashboardService::new(pool.clone(), snapshots);
    let state = AppState {
        db_pool: pool,
        dashboard,
        official: OfficialStatusPoller::new(Duration::from_secs(300)),
        background: BackgroundPoller::new(Duration::from_secs(60)),
    };

    let app = api::create_app(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server");
    });
    addr
}

async fn insert_maintenance_config(pool: &SqlitePool, id: &str, name: &str, group: Option<&str>) {
    sqlx::query(
        "INSERT INTO check_configs
            (id, name, type, model, api_key, enabled, is_maintenance, group_name)
         VALUES (?, ?, 'openai', 'gpt-4o-mini', 'sk-test', 1, 1, ?)",
    )
    .bind(id)
    .bind(name)
    .bind(group)
    .execute(pool)
    .await
    .expect("insert config");
}

#[tokio::test]
async fn test_health_endpoint() {
    let addr = spawn_app(memory_pool().await).await;

    let body: Value = reqwest::get(format!("http://{addr}/api/health"))
        .await
        .expect("request")
        .json()
        .await
        .expect("json body");
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_empty_dashboard_returns_zero_total() {
    let addr = spawn_app(memory_pool().await).await;

    let response = reqwest::get(format!("http://{addr}/api/dashboard"))
        .await
        .expect("request");
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.expect("json body");
    assert_eq!(body["total"], 0);
    assert_eq!(body["providerTimelines"], json!([]));
    assert_eq!(body["groupedTimelines"], json!([]));
    assert!(body["lastUpdated"].is_null());
    assert_eq!(body["pollIntervalMs"], 60_000);
    assert_eq!(body["pollIntervalLabel"], "1 分钟");
    assert!(body["generatedAt"].is_string());
}

#[tokio::test]
async fn test_unknown_group_returns_404_with_chinese_error() {
    let addr = spawn_app(memory_pool().await).await;

    let response = reqwest::get(format!("http://{addr}/api/group/unknown"))
        .await
        .expect("request");
    assert_eq!(response.status(), 404);

    let body: Value = response.json().await.expect("json body");
    assert_eq!(body, json!({"error": "分组不存在或没有配置"}));
}

#[tokio::test]
async fn test_ungrouped_sentinel_selects_configs_without_group() {
    let pool = memory_pool().await;
    insert_maintenance_config(&pool, "a", "目标甲", None).await;
    insert_maintenance_config(&pool, "b", "目标乙", None).await;
    insert_maintenance_config(&pool, "c", "目标丙", Some("生产")).await;
    let addr = spawn_app(pool).await;

    let response = reqwest::get(format!("http://{addr}/api/group/__ungrouped__"))
        .await
        .expect("request");
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.expect("json body");
    assert_eq!(body["groupName"], "__ungrouped__");
    assert_eq!(body["displayName"], "未分组");
    assert_eq!(body["total"], 2);

    let timelines = body["providerTimelines"].as_array().expect("timelines");
    assert_eq!(timelines.len(), 2);
    for timeline in timelines {
        assert_eq!(timeline["latest"]["status"], "maintenance");
        assert!(timeline["latest"]["latencyMs"].is_null());
        assert_eq!(timeline["latest"]["message"], "配置处于维护模式");
        assert_eq!(timeline["items"], json!([]));
    }
}

#[tokio::test]
async fn test_named_group_view_is_url_decoded() {
    let pool = memory_pool().await;
    insert_maintenance_config(&pool, "c", "目标丙", Some("生产")).await;
    let addr = spawn_app(pool).await;

    // 「生产」URL 编码后为 %E7%94%9F%E4%BA%A7
    let response = reqwest::get(format!("http://{addr}/api/group/%E7%94%9F%E4%BA%A7"))
        .await
        .expect("request");
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.expect("json body");
    assert_eq!(body["groupName"], "生产");
    assert_eq!(body["displayName"], "生产");
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn test_dashboard_groups_maintenance_targets() {
    let pool = memory_pool().await;
    insert_maintenance_config(&pool, "a", "目标甲", None).await;
    insert_maintenance_config(&pool, "c", "目标丙", Some("生产")).await;
    let addr = spawn_app(pool).await;

    let body: Value = reqwest::get(format!("http://{addr}/api/dashboard"))
        .await
        .expect("request")
        .json()
        .await
        .expect("json body");

    assert_eq!(body["total"], 2);
    let groups = body["groupedTimelines"].as_array().expect("groups");
    assert_eq!(groups.len(), 2);
    // 命名分组在前，未分组桶最后
    assert_eq!(groups[0]["groupName"], "生产");
    assert_eq!(groups[1]["groupName"], "__ungrouped__");
    assert_eq!(groups[1]["displayName"], "未分组");
}
