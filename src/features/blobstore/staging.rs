use std::future::Future;

use axum::body::Bytes;
use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use thiserror::Error;
use uuid::Uuid;

use crate::error::StorageError;
use crate::storage::{ObjectStorage, StorageKey};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// 已暂存的上传文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobInfo {
    /// 暂存桶中的存储键
    pub key: StorageKey,
    /// 文件大小（字节）
    pub size: u64,
    /// 客户端声明的 Content-Type
    pub content_type: String,
    /// 客户端提供的原始文件名
    pub filename: Option<String>,
}

#[derive(Error, Debug)]
pub enum BlobLookupError {
    /// 请求不是经由上传表单提交的（非 multipart）
    #[error("请求不是上传回调")]
    NotUploadCallback,
    /// 请求体超过硬上限，未暂存任何内容
    #[error("上传内容超过请求体上限")]
    BodyTooLarge,
    #[error("multipart 请求体无法解析: {0}")]
    Malformed(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<MultipartError> for BlobLookupError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            BlobLookupError::BodyTooLarge
        } else {
            BlobLookupError::Malformed(err.body_text())
        }
    }
}

/// 上传文件来源
pub trait UploadSource: Send {
    /// 取出指定表单字段对应的已暂存文件；字段缺失或文件为空时返回 `None`
    fn blob_info(
        &mut self,
        field_name: &str,
    ) -> impl Future<Output = Result<Option<BlobInfo>, BlobLookupError>> + Send;
}

/// 基于 multipart 请求体的上传来源：只暂存目标字段，其余字段直接跳过。
pub struct MultipartUpload<S> {
    multipart: Option<Multipart>,
    storage: S,
    staging_bucket: String,
}

impl<S: ObjectStorage> MultipartUpload<S> {
    /// `multipart` 为 `None` 表示请求不是 multipart/form-data
    pub fn new(multipart: Option<Multipart>, storage: S, staging_bucket: impl Into<String>) -> Self {
        Self {
            multipart,
            storage,
            staging_bucket: staging_bucket.into(),
        }
    }
}

impl<S: ObjectStorage> UploadSource for MultipartUpload<S> {
    async fn blob_info(&mut self, field_name: &str) -> Result<Option<BlobInfo>, BlobLookupError> {
        let Some(multipart) = self.multipart.as_mut() else {
            return Err(BlobLookupError::NotUploadCallback);
        };

        while let Some(mut field) = multipart.next_field().await? {
            if field.name() != Some(field_name) {
                continue;
            }
            // 同名的普通文本字段不是文件
            let Some(filename) = field.file_name().map(str::to_string) else {
                continue;
            };
            let content_type = field
                .content_type()
                .unwrap_or(DEFAULT_CONTENT_TYPE)
                .to_string();

            let mut data = Vec::new();
            while let Some(chunk) = field.chunk().await? {
                data.extend_from_slice(&chunk);
            }
            // 浏览器未选择文件时仍会提交一个空的文件字段
            if data.is_empty() {
                tracing::debug!(field = field_name, "上传字段为空文件");
                return Ok(None);
            }

            let size = data.len() as u64;
            let object = Uuid::new_v4().simple().to_string();
            let key = self
                .storage
                .write(&self.staging_bucket, &object, Bytes::from(data), &content_type)
                .await?;
            tracing::debug!(key = %key, size, content_type = %content_type, "上传文件已暂存");

            return Ok(Some(BlobInfo {
                key,
                size,
                content_type,
                filename: Some(filename).filter(|f| !f.is_empty()),
            }));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryObjectStore;
    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::{Request, header};

    const BOUNDARY: &str = "XyZboundary42";

    fn part(name: &str, filename: Option<&str>, content_type: Option<&str>, body: &[u8]) -> Vec<u8> {
        let mut out = format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"");
        if let Some(f) = filename {
            out.push_str(&format!("; filename=\"{f}\""));
        }
        out.push_str("\r\n");
        if let Some(ct) = content_type {
            out.push_str(&format!("Content-Type: {ct}\r\n"));
        }
        out.push_str("\r\n");
        let mut bytes = out.into_bytes();
        bytes.extend_from_slice(body);
        bytes.extend_from_slice(b"\r\n");
        bytes
    }

    async fn multipart_of(parts: Vec<Vec<u8>>) -> Multipart {
        let mut body: Vec<u8> = parts.into_iter().flatten().collect();
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        let req = Request::builder()
            .method("POST")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        Multipart::from_request(req, &()).await.expect("multipart")
    }

    #[tokio::test]
    async fn stages_only_the_requested_field() {
        let store = MemoryObjectStore::new();
        let mp = multipart_of(vec![
            part("note", None, None, b"hello"),
            part("other", Some("a.png"), Some("image/png"), b"not-me"),
            part("photo", Some("me.jpg"), Some("image/jpeg"), b"jpeg-bytes"),
        ])
        .await;
        let mut upload = MultipartUpload::new(Some(mp), store.clone(), "staging");

        let info = upload.blob_info("photo").await.expect("lookup").expect("blob");
        assert_eq!(info.size, 10);
        assert_eq!(info.content_type, "image/jpeg");
        assert_eq!(info.filename.as_deref(), Some("me.jpg"));
        assert_eq!(info.key.bucket(), "staging");
        assert_eq!(store.keys_in("staging").await, vec![info.key.clone()]);
    }

    #[tokio::test]
    async fn missing_and_empty_fields_yield_none() {
        let store = MemoryObjectStore::new();
        let mp = multipart_of(vec![part("note", None, None, b"hello")]).await;
        let mut upload = MultipartUpload::new(Some(mp), store.clone(), "staging");
        assert!(upload.blob_info("photo").await.unwrap().is_none());

        let mp = multipart_of(vec![part("photo", Some(""), Some("application/octet-stream"), b"")]).await;
        let mut upload = MultipartUpload::new(Some(mp), store.clone(), "staging");
        assert!(upload.blob_info("photo").await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn non_multipart_request_is_not_an_upload_callback() {
        let mut upload = MultipartUpload::new(None, MemoryObjectStore::new(), "staging");
        assert!(matches!(
            upload.blob_info("photo").await,
            Err(BlobLookupError::NotUploadCallback)
        ));
    }

    #[tokio::test]
    async fn missing_content_type_defaults_to_octet_stream() {
        let store = MemoryObjectStore::new();
        let mp = multipart_of(vec![part("photo", Some("x.bin"), None, b"abc")]).await;
        let mut upload = MultipartUpload::new(Some(mp), store, "staging");
        let info = upload.blob_info("photo").await.unwrap().unwrap();
        assert_eq!(info.content_type, DEFAULT_CONTENT_TYPE);
    }
}
