use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use axum::body::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ObjectStorage, StorageKey, StoredObject};
use crate::error::StorageError;

const META_DIR: &str = ".meta";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// 对象旁路元数据（`{bucket}/.meta/{object}.json`）
#[derive(Debug, Serialize, Deserialize)]
struct ObjectMeta {
    content_type: String,
    size: u64,
    updated_at: DateTime<Utc>,
}

/// 基于本地文件系统的对象存储：`{root}/{bucket}/{object}`。
///
/// 写入先落到同目录的临时文件再 rename，覆盖写对读者是原子的。
#[derive(Debug)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, key: &StorageKey) -> PathBuf {
        self.root.join(key.bucket()).join(key.object())
    }

    fn meta_path(&self, key: &StorageKey) -> PathBuf {
        self.root
            .join(key.bucket())
            .join(META_DIR)
            .join(format!("{}.json", key.object()))
    }
}

async fn write_atomically(dir: &Path, target: &Path, data: &[u8]) -> Result<(), StorageError> {
    let tmp = dir.join(format!(".tmp-{}", Uuid::new_v4().simple()));
    if let Err(e) = tokio::fs::write(&tmp, data).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    if let Err(e) = tokio::fs::rename(&tmp, target).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

async fn remove_if_exists(path: &Path) -> Result<(), StorageError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

impl ObjectStorage for LocalObjectStore {
    async fn write(
        &self,
        bucket: &str,
        object: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<StorageKey, StorageError> {
        let key = StorageKey::new(bucket, object)?;
        let bucket_dir = self.root.join(bucket);
        let meta_dir = bucket_dir.join(META_DIR);
        tokio::fs::create_dir_all(&meta_dir).await?;

        let meta = ObjectMeta {
            content_type: content_type.to_string(),
            size: data.len() as u64,
            updated_at: Utc::now(),
        };
        let meta_json = serde_json::to_vec(&meta)?;
        // 先写对象再写元数据：对象写入失败时不会留下孤立或过期的元数据
        write_atomically(&bucket_dir, &self.object_path(&key), &data).await?;
        if let Err(e) = write_atomically(&meta_dir, &self.meta_path(&key), &meta_json).await {
            let _ = remove_if_exists(&self.object_path(&key)).await;
            let _ = remove_if_exists(&self.meta_path(&key)).await;
            return Err(e);
        }

        tracing::debug!(key = %key, size = data.len(), "对象已写入本地存储");
        Ok(key)
    }

    async fn read(&self, key: &StorageKey) -> Result<Option<StoredObject>, StorageError> {
        let data = match tokio::fs::read(self.object_path(key)).await {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let content_type = match tokio::fs::read(self.meta_path(key)).await {
            Ok(raw) => serde_json::from_slice::<ObjectMeta>(&raw)?.content_type,
            Err(e) if e.kind() == ErrorKind::NotFound => DEFAULT_CONTENT_TYPE.to_string(),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(StoredObject {
            key: key.clone(),
            content_type,
            data: Bytes::from(data),
        }))
    }

    async fn delete(&self, key: &StorageKey) -> Result<(), StorageError> {
        remove_if_exists(&self.object_path(key)).await?;
        remove_if_exists(&self.meta_path(key)).await?;
        tracing::debug!(key = %key, "对象已从本地存储删除");
        Ok(())
    }
}
