/// 统一错误处理模块
pub mod error;

/// 配置模块
pub mod config;

/// SQLite 连接与建表
pub mod db;

/// 功能聚合模块
pub mod features;

/// OpenAPI 文档
pub mod openapi;

/// 请求追踪 ID 中间件
pub mod request_id;

/// 应用状态聚合模块
pub mod state;

/// 优雅退出管理模块
pub mod shutdown;

/// 对象存储
pub mod storage;

// 导出常用类型供外部使用
pub use config::AppConfig;
pub use error::AppError;
pub use shutdown::{ShutdownManager, ShutdownReason};
pub use state::{AppState, build_router};
