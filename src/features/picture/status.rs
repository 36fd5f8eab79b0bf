//! 给用户与管理员的提示文本

/// 头像保存成功
pub const PICTURE_SAVED: &str = "头像已保存";
/// 未选择文件
pub const NO_PICTURE_GIVEN: &str = "请选择要上传的图片文件";
/// 文件超过大小上限
pub const PICTURE_TOO_LARGE: &str = "上传的图片过大，请换一张更小的图片再试";
/// Content-Type 不是图片
pub const NOT_A_PICTURE: &str =
    "上传的文件不是图片，请上传图片（通常以 .jpg 或 .png 结尾）";
/// 存储/图片服务不可用
pub const PICTURE_SERVICE_DOWN: &str = "暂时无法上传头像，请稍后再试";

/// 管理员诊断日志的 tracing target
pub const ADMIN_LOG_TARGET: &str = "profile_backend::admin";

pub fn delete_failed_diagnostic(key: &str, err: &dyn std::fmt::Display) -> String {
    format!("删除头像文件失败（可能遗留未使用的文件，键: {key} || 错误信息: {err}）")
}

pub fn service_failure_diagnostic(user_id: &str, err: &dyn std::fmt::Display) -> String {
    format!("无法为账号 ({user_id}) 保存头像，存储/图片服务失败: {err}")
}

pub fn unexpected_failure_diagnostic(user_id: &str, err: &dyn std::fmt::Display) -> String {
    format!("账号 ({user_id}) 的头像上传异常中止: {err}")
}
