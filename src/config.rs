use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 全局配置单例
static CONFIG: OnceCell<AppConfig> = OnceCell::new();

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "ServerConfig::default_host")]
    pub host: String,
    /// 监听端口
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
}

impl ServerConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }
    fn default_port() -> u16 {
        8080
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别（未设置 RUST_LOG 时生效）
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
    /// 日志格式：full | compact
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
    fn default_format() -> String {
        "full".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            format: Self::default_format(),
        }
    }
}

/// 头像上传配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// 表单中的文件字段名
    #[serde(default = "UploadConfig::default_field_name")]
    pub field_name: String,
    /// 头像文件大小上限（字节），超过则提示“图片过大”
    #[serde(default = "UploadConfig::default_max_picture_bytes")]
    pub max_picture_bytes: u64,
    /// 整个上传请求体的硬上限（字节），防止暂存阶段被超大请求拖垮
    #[serde(default = "UploadConfig::default_max_request_bytes")]
    pub max_request_bytes: usize,
}

impl UploadConfig {
    fn default_field_name() -> String {
        "studentprofilephoto".to_string()
    }
    fn default_max_picture_bytes() -> u64 {
        5_000_000
    }
    fn default_max_request_bytes() -> usize {
        12 * 1024 * 1024
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            field_name: Self::default_field_name(),
            max_picture_bytes: Self::default_max_picture_bytes(),
            max_request_bytes: Self::default_max_request_bytes(),
        }
    }
}

/// 对象存储后端类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// 本地文件系统（默认）
    #[default]
    Local,
    /// 进程内存（仅用于测试与演示，重启即丢失）
    Memory,
}

/// 对象存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// 本地后端的根目录
    #[serde(default = "StorageConfig::default_root_dir")]
    pub root_dir: String,
    /// 正式头像所在的桶
    #[serde(default = "StorageConfig::default_bucket")]
    pub bucket: String,
    /// 上传暂存桶（校验/翻转前的原始文件）
    #[serde(default = "StorageConfig::default_staging_bucket")]
    pub staging_bucket: String,
}

impl StorageConfig {
    fn default_root_dir() -> String {
        "./resources/objects".to_string()
    }
    fn default_bucket() -> String {
        "profile-pictures".to_string()
    }
    fn default_staging_bucket() -> String {
        "upload-staging".to_string()
    }

    pub fn root_path(&self) -> PathBuf {
        PathBuf::from(&self.root_dir)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            root_dir: Self::default_root_dir(),
            bucket: Self::default_bucket(),
            staging_bucket: Self::default_staging_bucket(),
        }
    }
}

/// SQLite 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite 文件路径
    #[serde(default = "DatabaseConfig::default_sqlite_path")]
    pub sqlite_path: String,
    /// 是否启用 WAL
    #[serde(default = "DatabaseConfig::default_wal")]
    pub wal: bool,
}

impl DatabaseConfig {
    fn default_sqlite_path() -> String {
        "./resources/profiles.db".to_string()
    }
    fn default_wal() -> bool {
        true
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: Self::default_sqlite_path(),
            wal: Self::default_wal(),
        }
    }
}

/// 会话配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// 会话 Cookie 名称（也支持 `Authorization: Bearer`）
    #[serde(default = "SessionConfig::default_cookie_name")]
    pub cookie_name: String,
    /// 新签发会话的有效期（秒）
    #[serde(default = "SessionConfig::default_ttl")]
    pub ttl_secs: u64,
}

impl SessionConfig {
    fn default_cookie_name() -> String {
        "profile_session".to_string()
    }
    fn default_ttl() -> u64 {
        7 * 24 * 3600
    }

    pub fn ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.ttl_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: Self::default_cookie_name(),
            ttl_secs: Self::default_ttl(),
        }
    }
}

/// 优雅退出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// 优雅退出超时时间（秒）
    #[serde(default = "ShutdownConfig::default_timeout")]
    pub timeout_secs: u64,
}

impl ShutdownConfig {
    fn default_timeout() -> u64 {
        30
    }

    /// 获取优雅退出超时时间
    pub fn timeout_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout_secs: Self::default_timeout(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 头像上传配置
    #[serde(default)]
    pub upload: UploadConfig,
    /// 对象存储配置
    #[serde(default)]
    pub storage: StorageConfig,
    /// SQLite 配置
    #[serde(default)]
    pub database: DatabaseConfig,
    /// 会话配置
    #[serde(default)]
    pub session: SessionConfig,
    /// 优雅退出配置
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

impl AppConfig {
    /// 从配置文件加载配置，支持环境变量覆盖
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path();

        tracing::info!("正在从 {:?} 加载配置文件", config_path);

        let builder = ConfigBuilder::builder()
            // 配置文件可缺省，缺省时全部使用默认值
            .add_source(File::from(config_path).required(false))
            // 支持环境变量覆盖，例如：APP__UPLOAD__MAX_PICTURE_BYTES
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = builder.try_deserialize()?;

        tracing::debug!(
            "配置加载完成: storage.backend = {:?}, upload.max_picture_bytes = {}",
            config.storage.backend,
            config.upload.max_picture_bytes
        );

        Ok(config)
    }

    /// 获取全局配置单例
    pub fn global() -> &'static AppConfig {
        CONFIG.get().expect("配置未初始化，请先调用 init_global()")
    }

    /// 初始化全局配置
    pub fn init_global() -> Result<&'static AppConfig, ConfigError> {
        let config = Self::load()?;
        CONFIG
            .set(config)
            .map_err(|_| ConfigError::Message("配置已经被初始化".to_string()))?;
        Ok(Self::global())
    }

    /// 获取配置文件路径（可用 APP_CONFIG_PATH 指定）
    fn get_config_path() -> PathBuf {
        std::env::var("APP_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"))
    }

    /// 获取服务器监听地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
