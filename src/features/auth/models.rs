use axum::http::{HeaderMap, header};
use serde::Serialize;
use thiserror::Error;

use crate::error::AppError;

/// 已登录的账号
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// 用户 ID（同时作为头像对象名）
    #[schema(example = "alice@example.com")]
    pub user_id: String,
}

/// 请求携带的会话凭据（尚未校验）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub token: Option<String>,
}

impl Credentials {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// 从请求头提取凭据：优先 `Authorization: Bearer`，其次会话 Cookie。
    pub fn from_headers(headers: &HeaderMap, cookie_name: &str) -> Self {
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| {
                v.strip_prefix("Bearer ")
                    .or_else(|| v.strip_prefix("bearer "))
            })
            .map(str::trim)
            .filter(|t| !t.is_empty());
        if let Some(token) = bearer {
            return Self::with_token(token);
        }

        let cookie = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == cookie_name)
            .map(|(_, value)| value.trim())
            .filter(|t| !t.is_empty());

        Self {
            token: cookie.map(str::to_string),
        }
    }
}

/// 会话校验错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("未登录")]
    MissingCredentials,
    #[error("会话无效")]
    InvalidSession,
    #[error("会话已过期")]
    Expired,
    #[error("会话存储错误: {0}")]
    Backend(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Backend(msg) => AppError::Database(msg),
            other => AppError::Auth(other.to_string()),
        }
    }
}
