//! check-cx 服务入口

use check_cx::config::{get_env_with_fallback, get_env_with_fallback_or, get_env_with_fallback_parse};
use check_cx::db::history::HistoryStore;
use check_cx::official::OfficialStatusPoller;
use check_cx::probe::ProbeRunner;
use check_cx::snapshot::poller::BackgroundPoller;
use check_cx::snapshot::SnapshotService;
use check_cx::{config, dashboard, db, logging, server, AppState};
use clap::Parser;
use tracing::info;

#[derive(Parser)]
#[command(name = "check-cx", version, about = "AI 端点健康监控服务")]
struct Cli {
    /// 监听地址（默认取 CHECK_HOST，再默认 0.0.0.0）
    #[arg(long)]
    host: Option<String>,

    /// 监听端口（默认取 CHECK_PORT，再默认 3000）
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init().expect("failed to initialize logging");

    info!("check-cx v{}", env!("CARGO_PKG_VERSION"));

    let host = cli
        .host
        .unwrap_or_else(|| get_env_with_fallback_or("CHECK_HOST", "HOST", "0.0.0.0"));
    let port = cli
        .port
        .unwrap_or_else(|| get_env_with_fallback_parse("CHECK_PORT", "PORT", 3000));
    let bind_addr = format!("{host}:{port}");

    let database_url = get_env_with_fallback("CHECK_DATABASE_URL", "DATABASE_URL")
        .unwrap_or_else(db::default_database_url);

    let db_pool = db::init_pool(&database_url)
        .await
        .expect("Failed to connect to database");

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("Failed to run database migrations");

    let poll_interval = config::poll_interval();
    info!(
        poll_interval_secs = poll_interval.as_secs(),
        "Poll interval resolved"
    );

    let official = OfficialStatusPoller::new(config::official_poll_interval());
    official.ensure_running();

    let snapshots = SnapshotService::new(
        HistoryStore::new(db_pool.clone()),
        ProbeRunner::new(),
        official.clone(),
        poll_interval,
    );
    let dashboard = dashboard::DashboardService::new(db_pool.clone(), snapshots);

    let background = BackgroundPoller::new(poll_interval);
    background.ensure_running(dashboard.clone());

    let state = AppState {
        db_pool,
        dashboard,
        official,
        background,
    };

    server::run(state, &bind_addr).await;
}
