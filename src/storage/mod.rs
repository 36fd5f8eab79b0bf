//! 对象存储抽象
//!
//! 存储键形如 `/{bucket}/{object}`。正式头像以用户 ID 作为对象名（覆盖写，保证每个用户只有一份），
//! 上传暂存文件以随机 UUID 作为对象名放在暂存桶中。

mod local;
mod memory;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::body::Bytes;
use serde::{Deserialize, Serialize};

use crate::config::{StorageBackend, StorageConfig};
use crate::error::StorageError;

pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;

/// 桶名/对象名的最大长度（本地后端的元数据文件名还要加上 `.json`，需留在 255 字节的文件名上限内）
const MAX_SEGMENT_LEN: usize = 250;

/// 定位对象存储中一个文件的键
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorageKey {
    raw: String,
    split: usize,
}

impl StorageKey {
    pub fn new(bucket: &str, object: &str) -> Result<Self, StorageError> {
        validate_segment(bucket)?;
        validate_segment(object)?;
        Ok(Self {
            raw: format!("/{bucket}/{object}"),
            split: bucket.len() + 1,
        })
    }

    /// 解析 `/{bucket}/{object}` 形式的键
    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        let rest = raw
            .strip_prefix('/')
            .ok_or_else(|| StorageError::InvalidKey(raw.to_string()))?;
        let (bucket, object) = rest
            .split_once('/')
            .ok_or_else(|| StorageError::InvalidKey(raw.to_string()))?;
        Self::new(bucket, object)
    }

    pub fn bucket(&self) -> &str {
        &self.raw[1..self.split]
    }

    pub fn object(&self) -> &str {
        &self.raw[self.split + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for StorageKey {
    type Error = StorageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StorageKey> for String {
    fn from(key: StorageKey) -> Self {
        key.raw
    }
}

/// 名称片段校验：禁止空串、路径分隔符、以 `.` 开头（本地后端的临时文件与元数据目录占用该前缀）。
fn validate_segment(segment: &str) -> Result<(), StorageError> {
    let ok = !segment.is_empty()
        && segment.len() <= MAX_SEGMENT_LEN
        && !segment.starts_with('.')
        && !segment
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_control());
    if ok {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(segment.to_string()))
    }
}

/// 读出的对象
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub key: StorageKey,
    pub content_type: String,
    pub data: Bytes,
}

/// 对象存储服务
pub trait ObjectStorage: Send + Sync {
    /// 写入（或覆盖）`bucket/object`，返回其存储键
    fn write(
        &self,
        bucket: &str,
        object: &str,
        data: Bytes,
        content_type: &str,
    ) -> impl Future<Output = Result<StorageKey, StorageError>> + Send;

    /// 读取对象，不存在时返回 `None`
    fn read(
        &self,
        key: &StorageKey,
    ) -> impl Future<Output = Result<Option<StoredObject>, StorageError>> + Send;

    /// 删除对象；对象不存在视为成功
    fn delete(&self, key: &StorageKey) -> impl Future<Output = Result<(), StorageError>> + Send;
}

impl<T: ObjectStorage> ObjectStorage for Arc<T> {
    async fn write(
        &self,
        bucket: &str,
        object: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<StorageKey, StorageError> {
        self.as_ref().write(bucket, object, data, content_type).await
    }

    async fn read(&self, key: &StorageKey) -> Result<Option<StoredObject>, StorageError> {
        self.as_ref().read(key).await
    }

    async fn delete(&self, key: &StorageKey) -> Result<(), StorageError> {
        self.as_ref().delete(key).await
    }
}

/// 按配置选择的存储后端
#[derive(Debug, Clone)]
pub enum ObjectStoreHandle {
    Local(Arc<LocalObjectStore>),
    Memory(MemoryObjectStore),
}

impl ObjectStoreHandle {
    pub fn from_config(cfg: &StorageConfig) -> Self {
        match cfg.backend {
            StorageBackend::Local => {
                Self::Local(Arc::new(LocalObjectStore::new(cfg.root_path())))
            }
            StorageBackend::Memory => {
                tracing::warn!("使用内存对象存储，进程退出后头像将丢失");
                Self::Memory(MemoryObjectStore::new())
            }
        }
    }
}

impl ObjectStorage for ObjectStoreHandle {
    async fn write(
        &self,
        bucket: &str,
        object: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<StorageKey, StorageError> {
        match self {
            Self::Local(s) => s.write(bucket, object, data, content_type).await,
            Self::Memory(s) => s.write(bucket, object, data, content_type).await,
        }
    }

    async fn read(&self, key: &StorageKey) -> Result<Option<StoredObject>, StorageError> {
        match self {
            Self::Local(s) => s.read(key).await,
            Self::Memory(s) => s.read(key).await,
        }
    }

    async fn delete(&self, key: &StorageKey) -> Result<(), StorageError> {
        match self {
            Self::Local(s) => s.delete(key).await,
            Self::Memory(s) => s.delete(key).await,
        }
    }
}
