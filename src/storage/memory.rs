use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use tokio::sync::RwLock;

use super::{ObjectStorage, StorageKey, StoredObject};
use crate::error::StorageError;

/// 进程内对象存储（克隆共享同一份数据）
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<HashMap<StorageKey, StoredObject>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前对象数量
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// 某个桶内的全部键（按字典序）
    pub async fn keys_in(&self, bucket: &str) -> Vec<StorageKey> {
        let guard = self.objects.read().await;
        let mut keys: Vec<StorageKey> = guard
            .keys()
            .filter(|k| k.bucket() == bucket)
            .cloned()
            .collect();
        keys.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        keys
    }
}

impl ObjectStorage for MemoryObjectStore {
    async fn write(
        &self,
        bucket: &str,
        object: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<StorageKey, StorageError> {
        let key = StorageKey::new(bucket, object)?;
        let stored = StoredObject {
            key: key.clone(),
            content_type: content_type.to_string(),
            data,
        };
        self.objects.write().await.insert(key.clone(), stored);
        Ok(key)
    }

    async fn read(&self, key: &StorageKey) -> Result<Option<StoredObject>, StorageError> {
        Ok(self.objects.read().await.get(key).cloned())
    }

    async fn delete(&self, key: &StorageKey) -> Result<(), StorageError> {
        self.objects.write().await.remove(key);
        Ok(())
    }
}
