use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::StorageKey;

/// 用户资料
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    #[schema(example = "alice@example.com")]
    pub user_id: String,
    pub short_name: String,
    pub email: String,
    pub institute: String,
    /// 当前头像的存储键；未上传时为空
    #[schema(value_type = Option<String>, example = "/profile-pictures/alice@example.com")]
    pub picture_key: Option<StorageKey>,
    #[schema(value_type = String)]
    pub modified_at: DateTime<Utc>,
}

/// 新建资料参数
#[derive(Debug, Clone, Deserialize)]
pub struct NewProfile {
    pub user_id: String,
    pub short_name: String,
    pub email: String,
    pub institute: String,
}

/// 资料页响应：资料本身 + 上一次操作的提示信息
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePageResponse {
    pub profile: StudentProfile,
    /// 给用户看的提示（来自上一次跳转）
    pub messages: Vec<String>,
    pub is_error: bool,
    /// 前端是否应打开头像编辑面板
    pub edit_photo: bool,
}
