//! 头像上传处理流程
//!
//! `登录校验 → 取出暂存文件 → 校验 → 镜像校正 → 写入正式存储 → 更新资料 → 跳转`
//!
//! 任一步提前结束都会跳转回资料页（带错误标记与提示）；只有“意外失败”会在尽力清理后
//! 以 [`UploadError::Unexpected`] 交给上层错误处理。

use axum::body::Bytes;
use thiserror::Error;

use crate::config::AppConfig;
use crate::error::{AppError, ProfileError, StorageError, TransformError};
use crate::features::auth::{Account, AuthError, Credentials, Gatekeeper};
use crate::features::blobstore::{BlobInfo, BlobLookupError, UploadSource};
use crate::features::profile::ProfileStore;
use crate::storage::{ObjectStorage, StorageKey};

use super::redirect::{PARAM_EDIT_PHOTO, PROFILE_PAGE_ROUTE, RedirectResult};
use super::status::{self, ADMIN_LOG_TARGET};
use super::transform::{CompositeTransform, ImageTransformer};

/// 正式头像统一以 PNG 存储
pub const STORED_PICTURE_CONTENT_TYPE: &str = "image/png";

/// 上传流程参数
#[derive(Debug, Clone)]
pub struct UploadSettings {
    /// 表单文件字段名
    pub field_name: String,
    /// 文件大小上限（字节）
    pub max_picture_bytes: u64,
    /// 正式头像所在的桶
    pub bucket: String,
}

impl UploadSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            field_name: cfg.upload.field_name.clone(),
            max_picture_bytes: cfg.upload.max_picture_bytes,
            bucket: cfg.storage.bucket.clone(),
        }
    }
}

/// 正常结束（含校验失败、服务不可用）时的结果
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub redirect: RedirectResult,
    /// 给管理员的诊断信息（已写入日志，不展示给用户）
    pub admin_diagnostics: Vec<String>,
}

#[derive(Error, Debug)]
pub enum UploadError {
    /// 未登录：在接触任何存储之前中止
    #[error(transparent)]
    Unauthorized(#[from] AuthError),
    /// 意外失败：已尽力清理，交由上层错误处理
    #[error("头像上传失败: {source}")]
    Unexpected {
        #[source]
        source: AppError,
        admin_diagnostics: Vec<String>,
    },
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Unauthorized(e) => e.into(),
            UploadError::Unexpected { source, .. } => source,
        }
    }
}

/// 流程内部的失败分类
#[derive(Debug)]
enum StepFailure {
    /// 存储/图片服务失败：清理后照常跳转
    ServiceUnavailable(String),
    /// 其他失败：清理后向上抛出
    Unexpected(AppError),
}

impl From<StorageError> for StepFailure {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidKey(_) => StepFailure::Unexpected(err.into()),
            other => StepFailure::ServiceUnavailable(other.to_string()),
        }
    }
}

impl From<TransformError> for StepFailure {
    fn from(err: TransformError) -> Self {
        StepFailure::ServiceUnavailable(err.to_string())
    }
}

impl From<ProfileError> for StepFailure {
    fn from(err: ProfileError) -> Self {
        StepFailure::Unexpected(err.into())
    }
}

impl From<BlobLookupError> for StepFailure {
    fn from(err: BlobLookupError) -> Self {
        match err {
            BlobLookupError::Storage(e) => e.into(),
            other => StepFailure::Unexpected(AppError::Validation(other.to_string())),
        }
    }
}

/// 单次请求内逐步传递的状态
#[derive(Debug, Default)]
struct UploadProgress {
    statuses: Vec<String>,
    is_error: bool,
    admin_diagnostics: Vec<String>,
    /// 仍由本次请求持有、尚未删除的暂存文件
    held_blob: Option<StorageKey>,
    /// 已写入正式存储的头像
    stored_picture: Option<StorageKey>,
}

impl UploadProgress {
    fn reject(&mut self, message: &str) {
        self.is_error = true;
        self.statuses.push(message.to_string());
    }

    fn record_admin(&mut self, message: String) {
        tracing::warn!(target: ADMIN_LOG_TARGET, "{}", message);
        self.admin_diagnostics.push(message);
    }
}

/// 头像上传处理器
pub struct PictureUploadAction<G, S, T, P> {
    gatekeeper: G,
    storage: S,
    transformer: T,
    profiles: P,
    settings: UploadSettings,
}

impl<G, S, T, P> PictureUploadAction<G, S, T, P>
where
    G: Gatekeeper,
    S: ObjectStorage,
    T: ImageTransformer,
    P: ProfileStore,
{
    pub fn new(gatekeeper: G, storage: S, transformer: T, profiles: P, settings: UploadSettings) -> Self {
        Self {
            gatekeeper,
            storage,
            transformer,
            profiles,
            settings,
        }
    }

    /// 处理一次头像上传。
    ///
    /// 返回 `Ok` 时总是跳转回资料页；`Err(Unexpected)` 之前已尽力删除本次请求产生的文件。
    pub async fn handle<U: UploadSource>(
        &self,
        credentials: &Credentials,
        upload: &mut U,
    ) -> Result<UploadOutcome, UploadError> {
        let account = self.gatekeeper.verify_logged_in(credentials).await?;
        let mut progress = UploadProgress::default();

        let saved = match self.run(&account, upload, &mut progress).await {
            Ok(saved) => saved,
            Err(StepFailure::ServiceUnavailable(reason)) => {
                self.discard_all(&mut progress).await;
                progress.record_admin(status::service_failure_diagnostic(
                    &account.user_id,
                    &reason,
                ));
                progress.statuses.clear();
                progress.reject(status::PICTURE_SERVICE_DOWN);
                false
            }
            Err(StepFailure::Unexpected(err)) => {
                self.discard_all(&mut progress).await;
                progress.record_admin(status::unexpected_failure_diagnostic(
                    &account.user_id,
                    &err,
                ));
                return Err(UploadError::Unexpected {
                    source: err,
                    admin_diagnostics: progress.admin_diagnostics,
                });
            }
        };

        let mut redirect = RedirectResult::to(PROFILE_PAGE_ROUTE);
        if saved {
            progress.statuses.push(status::PICTURE_SAVED.to_string());
            redirect.add_param(PARAM_EDIT_PHOTO, "true");
            tracing::info!(user_id = %account.user_id, "头像上传完成");
        }

        Ok(UploadOutcome {
            redirect: redirect.with_statuses(progress.statuses, progress.is_error),
            admin_diagnostics: progress.admin_diagnostics,
        })
    }

    /// 返回是否保存了新头像
    async fn run<U: UploadSource>(
        &self,
        account: &Account,
        upload: &mut U,
        progress: &mut UploadProgress,
    ) -> Result<bool, StepFailure> {
        let Some(blob) = self.extract_picture(upload, progress).await? else {
            return Ok(false);
        };

        let picture_key = self.store_mirrored(account, &blob, progress).await?;
        self.profiles
            .update_picture_key(&account.user_id, &picture_key)
            .await?;
        Ok(true)
    }

    async fn extract_picture<U: UploadSource>(
        &self,
        upload: &mut U,
        progress: &mut UploadProgress,
    ) -> Result<Option<BlobInfo>, StepFailure> {
        match upload.blob_info(&self.settings.field_name).await {
            Ok(Some(blob)) => {
                progress.held_blob = Some(blob.key.clone());
                Ok(self.validate(blob, progress).await)
            }
            Ok(None) => {
                progress.reject(status::NO_PICTURE_GIVEN);
                Ok(None)
            }
            // 不是经由上传表单进入（例如直接访问），直接跳回资料页
            Err(BlobLookupError::NotUploadCallback) => {
                tracing::debug!("非上传回调请求，忽略");
                Ok(None)
            }
            Err(BlobLookupError::BodyTooLarge) => {
                progress.reject(status::PICTURE_TOO_LARGE);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn validate(&self, blob: BlobInfo, progress: &mut UploadProgress) -> Option<BlobInfo> {
        let rejection = if blob.size > self.settings.max_picture_bytes {
            Some(status::PICTURE_TOO_LARGE)
        } else if !blob.content_type.to_ascii_lowercase().contains("image/") {
            Some(status::NOT_A_PICTURE)
        } else {
            None
        };

        match rejection {
            None => Some(blob),
            Some(message) => {
                tracing::info!(
                    size = blob.size,
                    content_type = %blob.content_type,
                    "上传文件未通过校验: {}",
                    message
                );
                self.delete_picture(&blob.key, progress).await;
                progress.held_blob = None;
                progress.reject(message);
                None
            }
        }
    }

    /// 镜像校正后写入 `{bucket}/{user_id}`（覆盖旧头像），随后删除暂存原件。
    async fn store_mirrored(
        &self,
        account: &Account,
        blob: &BlobInfo,
        progress: &mut UploadProgress,
    ) -> Result<StorageKey, StepFailure> {
        let staged = self.storage.read(&blob.key).await?.ok_or_else(|| {
            StepFailure::Unexpected(AppError::Internal(format!("暂存文件已丢失: {}", blob.key)))
        })?;

        let png = self
            .transformer
            .apply(&CompositeTransform::mirror_correction(), staged.data)
            .await?;

        let key = self
            .storage
            .write(
                &self.settings.bucket,
                &account.user_id,
                Bytes::from(png),
                STORED_PICTURE_CONTENT_TYPE,
            )
            .await?;
        progress.stored_picture = Some(key.clone());

        self.delete_picture(&blob.key, progress).await;
        progress.held_blob = None;
        Ok(key)
    }

    /// 失败路径：删除本次请求产生的全部文件（尽力而为）
    async fn discard_all(&self, progress: &mut UploadProgress) {
        if let Some(key) = progress.stored_picture.take() {
            self.delete_picture(&key, progress).await;
        }
        if let Some(key) = progress.held_blob.take() {
            self.delete_picture(&key, progress).await;
        }
    }

    /// 删除失败只记录管理员诊断，不重试也不上抛
    async fn delete_picture(&self, key: &StorageKey, progress: &mut UploadProgress) {
        if let Err(e) = self.storage.delete(key).await {
            progress.record_admin(status::delete_failed_diagnostic(key.as_str(), &e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::picture::transform::PngTransformer;
    use crate::storage::{MemoryObjectStore, StoredObject};
    use image::{DynamicImage, ImageFormat, RgbaImage};
    use std::collections::{HashMap, HashSet};
    use std::io::Cursor;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    const PICTURES: &str = "profile-pictures";
    const STAGING: &str = "upload-staging";
    const FIELD: &str = "studentprofilephoto";

    struct AllowToken;

    impl Gatekeeper for AllowToken {
        async fn verify_logged_in(&self, credentials: &Credentials) -> Result<Account, AuthError> {
            match credentials.token.as_deref() {
                Some(t) => Ok(Account {
                    user_id: t.to_string(),
                }),
                None => Err(AuthError::MissingCredentials),
            }
        }
    }

    /// 可注入故障的存储包装
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryObjectStore,
        fail_writes_to: Mutex<HashSet<String>>,
        fail_deletes: AtomicBool,
        fail_reads: AtomicBool,
        delete_calls: AtomicUsize,
    }

    impl ObjectStorage for FlakyStore {
        async fn write(
            &self,
            bucket: &str,
            object: &str,
            data: Bytes,
            content_type: &str,
        ) -> Result<StorageKey, StorageError> {
            if self.fail_writes_to.lock().await.contains(bucket) {
                return Err(StorageError::Unavailable("bucket offline".into()));
            }
            self.inner.write(bucket, object, data, content_type).await
        }

        async fn read(&self, key: &StorageKey) -> Result<Option<StoredObject>, StorageError> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(StorageError::Io("read timed out".into()));
            }
            self.inner.read(key).await
        }

        async fn delete(&self, key: &StorageKey) -> Result<(), StorageError> {
            self.delete_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_deletes.load(Ordering::SeqCst) {
                return Err(StorageError::Io("disk on fire".into()));
            }
            self.inner.delete(key).await
        }
    }

    #[derive(Default)]
    struct FakeProfiles {
        keys: Mutex<HashMap<String, Option<StorageKey>>>,
    }

    impl FakeProfiles {
        async fn with_user(user: &str) -> Self {
            let p = Self::default();
            p.keys.lock().await.insert(user.to_string(), None);
            p
        }
    }

    impl ProfileStore for FakeProfiles {
        async fn update_picture_key(
            &self,
            user_id: &str,
            key: &StorageKey,
        ) -> Result<(), ProfileError> {
            match self.keys.lock().await.get_mut(user_id) {
                Some(slot) => {
                    *slot = Some(key.clone());
                    Ok(())
                }
                None => Err(ProfileError::NotFound(user_id.to_string())),
            }
        }
    }

    /// 预先暂存好的上传来源
    enum FakeUpload {
        Staged(Option<BlobInfo>),
        NotCallback,
        TooLarge,
        Broken,
        StagingDown,
    }

    impl UploadSource for FakeUpload {
        async fn blob_info(&mut self, field_name: &str) -> Result<Option<BlobInfo>, BlobLookupError> {
            assert_eq!(field_name, FIELD);
            match self {
                FakeUpload::Staged(b) => Ok(b.take()),
                FakeUpload::NotCallback => Err(BlobLookupError::NotUploadCallback),
                FakeUpload::TooLarge => Err(BlobLookupError::BodyTooLarge),
                FakeUpload::Broken => Err(BlobLookupError::Malformed("bad boundary".into())),
                FakeUpload::StagingDown => Err(BlobLookupError::Storage(StorageError::Unavailable(
                    "staging bucket offline".into(),
                ))),
            }
        }
    }

    type TestAction = PictureUploadAction<AllowToken, Arc<FlakyStore>, PngTransformer, Arc<FakeProfiles>>;

    fn settings(max: u64) -> UploadSettings {
        UploadSettings {
            field_name: FIELD.into(),
            max_picture_bytes: max,
            bucket: PICTURES.into(),
        }
    }

    fn action(store: &Arc<FlakyStore>, profiles: &Arc<FakeProfiles>, max: u64) -> TestAction {
        PictureUploadAction::new(
            AllowToken,
            store.clone(),
            PngTransformer,
            profiles.clone(),
            settings(max),
        )
    }

    fn jpeg_bytes() -> Bytes {
        let img = RgbaImage::from_pixel(3, 2, image::Rgba([10, 200, 30, 255]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .to_rgb8()
            .write_to(&mut out, ImageFormat::Jpeg)
            .unwrap();
        Bytes::from(out.into_inner())
    }

    async fn stage(store: &FlakyStore, data: Bytes, content_type: &str) -> BlobInfo {
        let size = data.len() as u64;
        let key = store
            .inner
            .write(STAGING, &uuid::Uuid::new_v4().simple().to_string(), data, content_type)
            .await
            .unwrap();
        BlobInfo {
            key,
            size,
            content_type: content_type.to_string(),
            filename: Some("me.jpg".into()),
        }
    }

    fn alice() -> Credentials {
        Credentials::with_token("alice")
    }

    #[tokio::test]
    async fn valid_picture_is_stored_and_profile_updated() {
        let store = Arc::new(FlakyStore::default());
        let profiles = Arc::new(FakeProfiles::with_user("alice").await);
        let blob = stage(&store, jpeg_bytes(), "image/jpeg").await;

        let outcome = action(&store, &profiles, 5_000_000)
            .handle(&alice(), &mut FakeUpload::Staged(Some(blob)))
            .await
            .expect("handled");

        let r = &outcome.redirect;
        assert_eq!(r.destination(), PROFILE_PAGE_ROUTE);
        assert!(!r.is_error());
        assert_eq!(r.statuses(), [status::PICTURE_SAVED.to_string()]);
        assert_eq!(r.param(PARAM_EDIT_PHOTO), Some("true"));
        assert!(outcome.admin_diagnostics.is_empty());

        let expected = StorageKey::new(PICTURES, "alice").unwrap();
        let stored = store.inner.read(&expected).await.unwrap().expect("stored");
        assert_eq!(stored.content_type, STORED_PICTURE_CONTENT_TYPE);
        assert_eq!(image::guess_format(&stored.data).unwrap(), ImageFormat::Png);
        assert!(store.inner.keys_in(STAGING).await.is_empty());
        assert_eq!(profiles.keys.lock().await["alice"], Some(expected));
    }

    #[tokio::test]
    async fn repeated_upload_overwrites_single_object() {
        let store = Arc::new(FlakyStore::default());
        let profiles = Arc::new(FakeProfiles::with_user("alice").await);
        let act = action(&store, &profiles, 5_000_000);

        for _ in 0..2 {
            let blob = stage(&store, jpeg_bytes(), "image/jpeg").await;
            act.handle(&alice(), &mut FakeUpload::Staged(Some(blob)))
                .await
                .unwrap();
        }
        assert_eq!(store.inner.keys_in(PICTURES).await.len(), 1);
        assert_eq!(store.inner.len().await, 1);
    }

    #[tokio::test]
    async fn oversized_picture_is_deleted_and_rejected() {
        let store = Arc::new(FlakyStore::default());
        let profiles = Arc::new(FakeProfiles::with_user("alice").await);
        let blob = stage(&store, jpeg_bytes(), "image/jpeg").await;

        let outcome = action(&store, &profiles, 10)
            .handle(&alice(), &mut FakeUpload::Staged(Some(blob)))
            .await
            .unwrap();

        assert!(outcome.redirect.is_error());
        assert_eq!(outcome.redirect.statuses(), [status::PICTURE_TOO_LARGE.to_string()]);
        assert_eq!(outcome.redirect.param(PARAM_EDIT_PHOTO), None);
        assert!(store.inner.is_empty().await);
        assert_eq!(profiles.keys.lock().await["alice"], None);
    }

    #[tokio::test]
    async fn non_image_content_type_is_deleted_and_rejected() {
        let store = Arc::new(FlakyStore::default());
        let profiles = Arc::new(FakeProfiles::with_user("alice").await);
        let blob = stage(&store, Bytes::from_static(b"%PDF-1.4"), "application/pdf").await;

        let outcome = action(&store, &profiles, 5_000_000)
            .handle(&alice(), &mut FakeUpload::Staged(Some(blob)))
            .await
            .unwrap();

        assert!(outcome.redirect.is_error());
        assert_eq!(outcome.redirect.statuses(), [status::NOT_A_PICTURE.to_string()]);
        assert!(store.inner.is_empty().await);
    }

    #[tokio::test]
    async fn missing_file_touches_no_storage() {
        let store = Arc::new(FlakyStore::default());
        let profiles = Arc::new(FakeProfiles::with_user("alice").await);

        let outcome = action(&store, &profiles, 5_000_000)
            .handle(&alice(), &mut FakeUpload::Staged(None))
            .await
            .unwrap();

        assert!(outcome.redirect.is_error());
        assert_eq!(outcome.redirect.statuses(), [status::NO_PICTURE_GIVEN.to_string()]);
        assert_eq!(store.delete_calls.load(Ordering::SeqCst), 0);
        assert!(store.inner.is_empty().await);
    }

    #[tokio::test]
    async fn direct_access_is_a_silent_redirect() {
        let store = Arc::new(FlakyStore::default());
        let profiles = Arc::new(FakeProfiles::with_user("alice").await);

        let outcome = action(&store, &profiles, 5_000_000)
            .handle(&alice(), &mut FakeUpload::NotCallback)
            .await
            .unwrap();

        assert!(!outcome.redirect.is_error());
        assert!(outcome.redirect.statuses().is_empty());
        assert_eq!(outcome.redirect.location(), PROFILE_PAGE_ROUTE);
    }

    #[tokio::test]
    async fn body_over_hard_limit_reports_too_large() {
        let store = Arc::new(FlakyStore::default());
        let profiles = Arc::new(FakeProfiles::with_user("alice").await);

        let outcome = action(&store, &profiles, 5_000_000)
            .handle(&alice(), &mut FakeUpload::TooLarge)
            .await
            .unwrap();
        assert!(outcome.redirect.is_error());
        assert_eq!(outcome.redirect.statuses(), [status::PICTURE_TOO_LARGE.to_string()]);
    }

    #[tokio::test]
    async fn storage_failure_cleans_up_and_reports_service_down() {
        let store = Arc::new(FlakyStore::default());
        store.fail_writes_to.lock().await.insert(PICTURES.to_string());
        let profiles = Arc::new(FakeProfiles::with_user("alice").await);
        let blob = stage(&store, jpeg_bytes(), "image/jpeg").await;

        let outcome = action(&store, &profiles, 5_000_000)
            .handle(&alice(), &mut FakeUpload::Staged(Some(blob)))
            .await
            .expect("service failure is recovered");

        assert!(outcome.redirect.is_error());
        assert_eq!(
            outcome.redirect.statuses(),
            [status::PICTURE_SERVICE_DOWN.to_string()]
        );
        assert!(store.inner.is_empty().await, "staged blob must be removed");
        assert_eq!(outcome.admin_diagnostics.len(), 1);
        assert!(outcome.admin_diagnostics[0].contains("alice"));
        assert_eq!(profiles.keys.lock().await["alice"], None);
    }

    #[tokio::test]
    async fn undecodable_image_is_a_service_failure() {
        let store = Arc::new(FlakyStore::default());
        let profiles = Arc::new(FakeProfiles::with_user("alice").await);
        let blob = stage(&store, Bytes::from_static(b"not really a png"), "image/png").await;

        let outcome = action(&store, &profiles, 5_000_000)
            .handle(&alice(), &mut FakeUpload::Staged(Some(blob)))
            .await
            .unwrap();

        assert_eq!(
            outcome.redirect.statuses(),
            [status::PICTURE_SERVICE_DOWN.to_string()]
        );
        assert!(store.inner.is_empty().await);
    }

    #[tokio::test]
    async fn failed_delete_is_only_an_admin_diagnostic() {
        let store = Arc::new(FlakyStore::default());
        store.fail_deletes.store(true, Ordering::SeqCst);
        let profiles = Arc::new(FakeProfiles::with_user("alice").await);
        let blob = stage(&store, jpeg_bytes(), "image/jpeg").await;
        let staged_key = blob.key.clone();

        let outcome = action(&store, &profiles, 5_000_000)
            .handle(&alice(), &mut FakeUpload::Staged(Some(blob)))
            .await
            .expect("delete failure never escalates");

        assert!(!outcome.redirect.is_error());
        assert_eq!(outcome.redirect.statuses(), [status::PICTURE_SAVED.to_string()]);
        assert_eq!(outcome.admin_diagnostics.len(), 1);
        assert!(outcome.admin_diagnostics[0].contains(staged_key.as_str()));
        assert!(outcome.admin_diagnostics[0].contains("disk on fire"));
    }

    #[tokio::test]
    async fn missing_profile_propagates_after_cleanup() {
        let store = Arc::new(FlakyStore::default());
        let profiles = Arc::new(FakeProfiles::default());
        let blob = stage(&store, jpeg_bytes(), "image/jpeg").await;

        let err = action(&store, &profiles, 5_000_000)
            .handle(&alice(), &mut FakeUpload::Staged(Some(blob)))
            .await
            .unwrap_err();

        match err {
            UploadError::Unexpected { source, .. } => {
                assert!(matches!(source, AppError::NotFound(_)));
            }
            other => panic!("unexpected error kind: {other:?}"),
        }
        assert!(store.inner.is_empty().await, "new picture and staged blob removed");
    }

    #[tokio::test]
    async fn staging_failure_reports_service_down() {
        let store = Arc::new(FlakyStore::default());
        let profiles = Arc::new(FakeProfiles::with_user("alice").await);

        let outcome = action(&store, &profiles, 5_000_000)
            .handle(&alice(), &mut FakeUpload::StagingDown)
            .await
            .expect("staging failure is recovered");

        assert!(outcome.redirect.is_error());
        assert_eq!(
            outcome.redirect.statuses(),
            [status::PICTURE_SERVICE_DOWN.to_string()]
        );
        assert_eq!(outcome.admin_diagnostics.len(), 1);
        assert!(outcome.admin_diagnostics[0].contains("staging bucket offline"));
        assert_eq!(store.delete_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn staged_read_failure_removes_blob_and_reports_service_down() {
        let store = Arc::new(FlakyStore::default());
        store.fail_reads.store(true, Ordering::SeqCst);
        let profiles = Arc::new(FakeProfiles::with_user("alice").await);
        let blob = stage(&store, jpeg_bytes(), "image/jpeg").await;

        let outcome = action(&store, &profiles, 5_000_000)
            .handle(&alice(), &mut FakeUpload::Staged(Some(blob)))
            .await
            .expect("read failure is recovered");

        assert!(outcome.redirect.is_error());
        assert_eq!(
            outcome.redirect.statuses(),
            [status::PICTURE_SERVICE_DOWN.to_string()]
        );
        assert!(store.inner.is_empty().await, "staged blob must be removed");
        assert_eq!(profiles.keys.lock().await["alice"], None);
    }

    #[tokio::test]
    async fn malformed_body_propagates() {
        let store = Arc::new(FlakyStore::default());
        let profiles = Arc::new(FakeProfiles::with_user("alice").await);

        let err = action(&store, &profiles, 5_000_000)
            .handle(&alice(), &mut FakeUpload::Broken)
            .await
            .unwrap_err();
        let app: AppError = err.into();
        assert!(matches!(app, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn unauthenticated_caller_is_rejected_before_lookup() {
        let store = Arc::new(FlakyStore::default());
        let profiles = Arc::new(FakeProfiles::with_user("alice").await);
        // Broken 若被调用会产生 Unexpected；这里必须先因未登录中止
        let err = action(&store, &profiles, 5_000_000)
            .handle(&Credentials::default(), &mut FakeUpload::Broken)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Unauthorized(AuthError::MissingCredentials)));
        assert_eq!(store.delete_calls.load(Ordering::SeqCst), 0);
    }
}
