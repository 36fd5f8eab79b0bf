use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use crate::error::ProfileError;
use crate::storage::StorageKey;

use super::models::{NewProfile, StudentProfile};

/// 用户资料服务（头像上传流程只关心头像键）
pub trait ProfileStore: Send + Sync {
    /// 将用户资料的头像键更新为 `key`；资料不存在时返回 `ProfileError::NotFound`
    fn update_picture_key(
        &self,
        user_id: &str,
        key: &StorageKey,
    ) -> impl Future<Output = Result<(), ProfileError>> + Send;
}

impl<T: ProfileStore> ProfileStore for Arc<T> {
    async fn update_picture_key(&self, user_id: &str, key: &StorageKey) -> Result<(), ProfileError> {
        self.as_ref().update_picture_key(user_id, key).await
    }
}

/// SQLite 资料表（`student_profiles`）
#[derive(Debug, Clone)]
pub struct SqliteProfileStore {
    pool: SqlitePool,
}

fn row_to_profile(row: &SqliteRow) -> Result<StudentProfile, ProfileError> {
    let picture_key: Option<String> = row.try_get("picture_key")?;
    let modified_at: String = row.try_get("modified_at")?;
    Ok(StudentProfile {
        user_id: row.try_get("user_id")?,
        short_name: row.try_get("short_name")?,
        email: row.try_get("email")?,
        institute: row.try_get("institute")?,
        // 旧数据里的非法键按“无头像”处理
        picture_key: picture_key.and_then(|k| StorageKey::parse(&k).ok()),
        modified_at: DateTime::parse_from_rfc3339(&modified_at)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| ProfileError::Database(format!("modified_at 格式错误: {e}")))?,
    })
}

impl SqliteProfileStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, user_id: &str) -> Result<Option<StudentProfile>, ProfileError> {
        let row = sqlx::query(
            "SELECT user_id, short_name, email, institute, picture_key, modified_at
             FROM student_profiles WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_profile).transpose()
    }

    pub async fn create(&self, profile: &NewProfile) -> Result<StudentProfile, ProfileError> {
        let now = Utc::now();
        let res = sqlx::query(
            "INSERT INTO student_profiles (user_id, short_name, email, institute, picture_key, modified_at)
             VALUES (?, ?, ?, ?, NULL, ?)
             ON CONFLICT(user_id) DO NOTHING",
        )
        .bind(&profile.user_id)
        .bind(&profile.short_name)
        .bind(&profile.email)
        .bind(&profile.institute)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;
        if res.rows_affected() == 0 {
            return Err(ProfileError::AlreadyExists(profile.user_id.clone()));
        }
        self.get(&profile.user_id)
            .await?
            .ok_or_else(|| ProfileError::NotFound(profile.user_id.clone()))
    }

    /// 清除头像键（不删除存储中的对象）
    pub async fn clear_picture_key(&self, user_id: &str) -> Result<(), ProfileError> {
        let res = sqlx::query(
            "UPDATE student_profiles SET picture_key = NULL, modified_at = ? WHERE user_id = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        if res.rows_affected() == 0 {
            return Err(ProfileError::NotFound(user_id.to_string()));
        }
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<StudentProfile>, ProfileError> {
        let rows = sqlx::query(
            "SELECT user_id, short_name, email, institute, picture_key, modified_at
             FROM student_profiles ORDER BY user_id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_profile).collect()
    }
}

impl ProfileStore for SqliteProfileStore {
    async fn update_picture_key(&self, user_id: &str, key: &StorageKey) -> Result<(), ProfileError> {
        let res = sqlx::query(
            "UPDATE student_profiles SET picture_key = ?, modified_at = ? WHERE user_id = ?",
        )
        .bind(key.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        if res.rows_affected() == 0 {
            return Err(ProfileError::NotFound(user_id.to_string()));
        }
        tracing::debug!(user_id, key = %key, "头像键已更新");
        Ok(())
    }
}
