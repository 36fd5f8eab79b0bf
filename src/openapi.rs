use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// 注入会话令牌的安全定义：`Authorization: Bearer <token>` 或会话 Cookie。
struct SessionTokenSecurity;

impl Modify for SessionTokenSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "SessionToken",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
        components.add_security_scheme(
            "SessionCookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("profile_session"))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::features::health::handler::health_check,
        crate::features::picture::handler::upload_profile_picture,
        crate::features::profile::handler::get_profile_page,
        crate::features::profile::handler::get_profile_picture,
    ),
    components(schemas(
        crate::error::ProblemDetails,
        crate::features::picture::handler::PictureUploadForm,
        crate::features::profile::StudentProfile,
        crate::features::profile::ProfilePageResponse,
        crate::features::auth::Account,
    )),
    modifiers(&SessionTokenSecurity),
    tags(
        (name = "Picture", description = "头像上传：镜像校正后统一保存为 PNG，完成后跳转回资料页。"),
        (name = "Profile", description = "用户资料：资料页数据与当前头像。"),
        (name = "Health", description = "健康检查：服务探活。"),
    ),
    info(
        title = "Profile Backend API",
        version = env!("CARGO_PKG_VERSION"),
        description = "用户资料与头像上传服务（Axum + utoipa）。"
    )
)]
pub struct ApiDoc;
