use std::sync::Arc;

use axum::Router;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::features::auth::SessionStore;
use crate::features::health::health_check;
use crate::features::picture::{
    PictureUploadAction, PngTransformer, UploadSettings, create_picture_router,
};
use crate::features::profile::{SqliteProfileStore, create_profile_router};
use crate::openapi::ApiDoc;
use crate::storage::ObjectStoreHandle;

/// 生产环境下的头像上传处理器
pub type ProfilePictureUpload =
    PictureUploadAction<SessionStore, ObjectStoreHandle, PngTransformer, SqliteProfileStore>;

/// 聚合的应用共享状态
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub sessions: SessionStore,
    pub profiles: SqliteProfileStore,
    /// 正式头像与上传暂存共用的对象存储
    pub objects: ObjectStoreHandle,
    pub picture_upload: Arc<ProfilePictureUpload>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, pool: SqlitePool, objects: ObjectStoreHandle) -> Self {
        let sessions = SessionStore::new(pool.clone());
        let profiles = SqliteProfileStore::new(pool);
        let picture_upload = Arc::new(PictureUploadAction::new(
            sessions.clone(),
            objects.clone(),
            PngTransformer,
            profiles.clone(),
            UploadSettings::from_config(&config),
        ));
        Self {
            config,
            sessions,
            profiles,
            objects,
            picture_upload,
        }
    }
}

/// 组装全部路由与全局中间件
pub fn build_router(state: AppState) -> Router {
    let max_request_bytes = state.config.upload.max_request_bytes;
    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(create_picture_router(max_request_bytes))
        .merge(create_profile_router())
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(
            crate::request_id::request_id_middleware,
        ))
}
