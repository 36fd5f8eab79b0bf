/// 登录会话
pub mod auth;
/// 上传暂存
pub mod blobstore;
/// 健康检查
pub mod health;
/// 头像上传
pub mod picture;
/// 用户资料
pub mod profile;
