//! 数据库访问

pub mod configs;
pub mod history;

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use std::str::FromStr;

/// 创建 SQLite 连接池
///
/// SQLite 文件所在目录不存在时先创建，数据库文件缺失时自动建立。
pub async fn init_pool(database_url: &str) -> sqlx::Result<SqlitePool> {
    if let Some(path) = database_url.strip_prefix("sqlite:") {
        // `sqlite::memory:` 这类特殊地址跳过
        if !path.starts_with(':') {
            let normalized = path.trim_start_matches("//");
            let path_without_params = normalized.split('?').next().unwrap_or(normalized);
            let db_path = std::path::Path::new(path_without_params);
            if let Some(parent) = db_path.parent() {
                if let Err(err) = std::fs::create_dir_all(parent) {
                    tracing::error!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        err
                    );
                }
            }
        }
    }

    let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    SqlitePool::connect_with(connect_options).await
}

/// 默认数据库地址（`~/.check-cx/check-cx.db`）
pub fn default_database_url() -> String {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    format!("sqlite:{}/.check-cx/check-cx.db", home)
}
