use std::sync::Arc;

use profile_backend::storage::ObjectStoreHandle;
use profile_backend::{AppConfig, AppState, ShutdownManager, build_router, db};

fn init_tracing(cfg: &AppConfig) {
    // RUST_LOG 优先；否则使用配置中的级别
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "profile_backend={level},tower_http={level}",
            level = cfg.logging.level
        )
        .into()
    });
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if cfg.logging.format == "compact" {
        builder.compact().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() {
    let config = match AppConfig::init_global() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config init failed: {e}");
            std::process::exit(1);
        }
    };
    init_tracing(config);

    let shutdown_manager = ShutdownManager::new();
    if let Err(e) = shutdown_manager.start_signal_handler().await {
        tracing::error!("信号处理器启动失败: {}", e);
        std::process::exit(1);
    }

    let pool = match db::connect_sqlite(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            tracing::error!("数据库初始化失败: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = db::init_schema(&pool).await {
        tracing::error!("建表失败: {}", e);
        std::process::exit(1);
    }

    let objects = ObjectStoreHandle::from_config(&config.storage);
    let state = AppState::new(Arc::new(config.clone()), pool, objects);

    // 启动时顺手清理过期会话
    match state.sessions.purge_expired().await {
        Ok(n) if n > 0 => tracing::info!("已清理 {} 条过期会话", n),
        Ok(_) => {}
        Err(e) => tracing::warn!("清理过期会话失败: {}", e),
    }

    let app = build_router(state);

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Bind address failed {}: {}", addr, e);
            std::process::exit(1);
        });

    tracing::info!("Server: http://{}", addr);
    tracing::info!("Docs: http://{}/docs", addr);
    tracing::info!("Health: http://{}/health", addr);
    tracing::info!("Objects: {:?} ({:?})", config.storage.root_path(), config.storage.backend);

    let shutdown_timeout = config.shutdown.timeout_duration();
    let signal = shutdown_manager.clone();
    let graceful = axum::serve(listener, app).with_graceful_shutdown(async move {
        let reason = signal.wait_for_shutdown().await;
        tracing::info!("接收到退出信号: {:?}，开始优雅关闭HTTP服务器...", reason);
    });

    tokio::select! {
        res = graceful => {
            if let Err(e) = res {
                tracing::error!("服务器运行错误: {}", e);
                std::process::exit(1);
            }
            tracing::info!("服务器已优雅关闭");
        }
        _ = shutdown_manager.drain_deadline(shutdown_timeout) => {
            tracing::warn!(
                "优雅退出超时（{}秒），放弃未完成的请求",
                config.shutdown.timeout_secs
            );
        }
    }
}
