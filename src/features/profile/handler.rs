use axum::{
    Json, Router,
    extract::{RawQuery, State},
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
    routing::get,
};

use crate::error::AppError;
use crate::features::auth::{Account, Credentials, Gatekeeper};
use crate::features::picture::PageNotice;
use crate::features::picture::redirect::{PROFILE_PAGE_ROUTE, PROFILE_PICTURE_ROUTE};
use crate::state::AppState;
use crate::storage::ObjectStorage;

use super::models::ProfilePageResponse;

async fn current_account(state: &AppState, headers: &HeaderMap) -> Result<Account, AppError> {
    let credentials = Credentials::from_headers(headers, &state.config.session.cookie_name);
    Ok(state.sessions.verify_logged_in(&credentials).await?)
}

#[utoipa::path(
    get,
    path = "/page/studentProfilePage",
    summary = "资料页",
    description = "返回当前用户资料，以及上一次跳转携带的提示信息（`message`/`error`/`editphoto`）。",
    params(
        ("message" = Option<String>, Query, description = "提示信息，可重复"),
        ("error" = Option<bool>, Query, description = "提示是否为错误"),
        ("editphoto" = Option<bool>, Query, description = "是否打开头像编辑面板")
    ),
    responses(
        (status = 200, description = "资料页数据", body = ProfilePageResponse),
        (
            status = 401,
            description = "未登录",
            body = crate::error::ProblemDetails,
            content_type = "application/problem+json"
        ),
        (
            status = 404,
            description = "资料不存在",
            body = crate::error::ProblemDetails,
            content_type = "application/problem+json"
        )
    ),
    security(("SessionToken" = [])),
    tag = "Profile"
)]
pub async fn get_profile_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Result<Json<ProfilePageResponse>, AppError> {
    let account = current_account(&state, &headers).await?;
    let profile = state
        .profiles
        .get(&account.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("资料不存在: {}", account.user_id)))?;

    let notice = PageNotice::from_query(query.as_deref());
    Ok(Json(ProfilePageResponse {
        profile,
        messages: notice.messages,
        is_error: notice.is_error,
        edit_photo: notice.edit_photo,
    }))
}

#[utoipa::path(
    get,
    path = "/students/profilePic",
    summary = "当前用户头像",
    description = "返回当前用户已保存的头像（PNG）。未上传过头像时返回 404。",
    responses(
        (status = 200, description = "头像图片", content_type = "image/png"),
        (
            status = 401,
            description = "未登录",
            body = crate::error::ProblemDetails,
            content_type = "application/problem+json"
        ),
        (
            status = 404,
            description = "未上传头像",
            body = crate::error::ProblemDetails,
            content_type = "application/problem+json"
        )
    ),
    security(("SessionToken" = [])),
    tag = "Profile"
)]
pub async fn get_profile_picture(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let account = current_account(&state, &headers).await?;
    let key = state
        .profiles
        .get(&account.user_id)
        .await?
        .and_then(|p| p.picture_key)
        .ok_or_else(|| AppError::NotFound("尚未上传头像".into()))?;

    let object = state
        .objects
        .read(&key)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("头像文件不存在: {key}")))?;

    let content_type = HeaderValue::from_str(&object.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            // 头像会被原地覆盖，不允许长期缓存
            (header::CACHE_CONTROL, HeaderValue::from_static("private, no-cache")),
        ],
        object.data,
    )
        .into_response())
}

pub fn create_profile_router() -> Router<AppState> {
    Router::new()
        .route(PROFILE_PAGE_ROUTE, get(get_profile_page))
        .route(PROFILE_PICTURE_ROUTE, get(get_profile_picture))
}
