use std::path::Path;

use sqlx::{ConnectOptions, SqlitePool, sqlite::SqliteConnectOptions};

use crate::config::DatabaseConfig;
use crate::error::AppError;

/// 打开（必要时创建）SQLite 数据库并设置常用 PRAGMA。
pub async fn connect_sqlite(cfg: &DatabaseConfig) -> Result<SqlitePool, AppError> {
    let path = Path::new(&cfg.sqlite_path);
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AppError::Internal(format!("创建数据库目录失败: {e}")))?;
    }

    let opt = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .log_statements(tracing::log::LevelFilter::Off);
    let pool = SqlitePool::connect_with(opt)
        .await
        .map_err(|e| AppError::Database(format!("sqlite connect: {e}")))?;
    if cfg.wal {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&pool)
            .await
            .ok();
    }
    sqlx::query("PRAGMA synchronous=NORMAL;")
        .execute(&pool)
        .await
        .ok();
    sqlx::query("PRAGMA foreign_keys=ON;")
        .execute(&pool)
        .await
        .ok();
    Ok(pool)
}

/// 建表（幂等）：资料表与会话表。
pub async fn init_schema(pool: &SqlitePool) -> Result<(), AppError> {
    let ddl = r#"
    CREATE TABLE IF NOT EXISTS student_profiles (
        user_id TEXT PRIMARY KEY,
        short_name TEXT NOT NULL DEFAULT '',
        email TEXT NOT NULL DEFAULT '',
        institute TEXT NOT NULL DEFAULT '',
        picture_key TEXT,
        modified_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS sessions (
        token TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        expires_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
    CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);
    "#;
    sqlx::raw_sql(ddl)
        .execute(pool)
        .await
        .map_err(|e| AppError::Database(format!("init schema: {e}")))?;
    Ok(())
}
