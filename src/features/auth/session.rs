use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use rand::RngCore;
use sqlx::{Row, SqlitePool};

use super::models::{Account, AuthError, Credentials};

/// 登录态校验
pub trait Gatekeeper: Send + Sync {
    /// 校验调用方已登录，返回对应账号
    fn verify_logged_in(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<Account, AuthError>> + Send;
}

/// SQLite 会话表（`sessions`）
#[derive(Debug, Clone)]
pub struct SessionStore {
    pool: SqlitePool,
}

fn generate_token() -> String {
    let mut buf = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

fn backend(e: sqlx::Error) -> AuthError {
    AuthError::Backend(e.to_string())
}

impl SessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 为用户签发新会话，返回令牌
    pub async fn issue(&self, user_id: &str, ttl: Duration) -> Result<String, AuthError> {
        let token = generate_token();
        let now = Utc::now().timestamp();
        let expires_at = now.saturating_add(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX));
        sqlx::query(
            "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&token)
        .bind(user_id)
        .bind(now)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        tracing::info!(user_id, "已签发会话");
        Ok(token)
    }

    /// 注销会话（不存在也视为成功）
    pub async fn revoke(&self, token: &str) -> Result<(), AuthError> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    /// 清理过期会话，返回删除条数
    pub async fn purge_expired(&self) -> Result<u64, AuthError> {
        let res = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(res.rows_affected())
    }
}

impl Gatekeeper for SessionStore {
    async fn verify_logged_in(&self, credentials: &Credentials) -> Result<Account, AuthError> {
        let token = credentials
            .token
            .as_deref()
            .ok_or(AuthError::MissingCredentials)?;

        let row = sqlx::query("SELECT user_id, expires_at FROM sessions WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or(AuthError::InvalidSession)?;

        let expires_at: i64 = row.try_get("expires_at").map_err(backend)?;
        if expires_at <= Utc::now().timestamp() {
            return Err(AuthError::Expired);
        }
        let user_id: String = row.try_get("user_id").map_err(backend)?;
        Ok(Account { user_id })
    }
}
