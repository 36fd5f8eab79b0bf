use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartRejection},
    http::HeaderMap,
    routing::post,
};

use crate::error::AppError;
use crate::features::auth::Credentials;
use crate::features::blobstore::MultipartUpload;
use crate::state::AppState;

use super::redirect::{PICTURE_UPLOAD_ROUTE, RedirectResult};

/// 头像上传表单（仅用于文档）
#[derive(utoipa::ToSchema)]
pub struct PictureUploadForm {
    /// 头像文件（字段名可通过 `upload.field_name` 配置）
    #[schema(value_type = String, format = Binary)]
    pub studentprofilephoto: Vec<u8>,
}

#[utoipa::path(
    post,
    path = "/page/studentProfilePictureUpload",
    summary = "上传头像",
    description = "浏览器上传表单的回调。头像经镜像校正后统一存为 PNG，完成后以 303 跳转回资料页；\
提示信息通过 `message`/`error`/`editphoto` 查询参数携带。非 multipart 请求直接跳转，不做任何处理。",
    request_body(content = PictureUploadForm, content_type = "multipart/form-data"),
    responses(
        (
            status = 303,
            description = "跳转回资料页",
            headers(("Location" = String, description = "资料页地址（含提示参数）"))
        ),
        (
            status = 401,
            description = "未登录或会话已过期",
            body = crate::error::ProblemDetails,
            content_type = "application/problem+json"
        ),
        (
            status = 500,
            description = "意外失败（已清理本次上传产生的文件）",
            body = crate::error::ProblemDetails,
            content_type = "application/problem+json"
        )
    ),
    security(("SessionToken" = [])),
    tag = "Picture"
)]
pub async fn upload_profile_picture(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<RedirectResult, AppError> {
    let credentials = Credentials::from_headers(&headers, &state.config.session.cookie_name);

    let multipart = match multipart {
        Ok(m) => Some(m),
        Err(rejection) => {
            tracing::debug!("非 multipart 请求: {}", rejection);
            None
        }
    };
    let mut upload = MultipartUpload::new(
        multipart,
        state.objects.clone(),
        state.config.storage.staging_bucket.clone(),
    );

    let outcome = state.picture_upload.handle(&credentials, &mut upload).await?;
    Ok(outcome.redirect)
}

/// 头像上传路由；`max_request_bytes` 为整个请求体的硬上限
pub fn create_picture_router(max_request_bytes: usize) -> Router<AppState> {
    Router::new().route(
        PICTURE_UPLOAD_ROUTE,
        post(upload_profile_picture).layer(DefaultBodyLimit::max(max_request_bytes)),
    )
}
