//! 头像上传
//!
//! - `action`：上传处理流程（校验、镜像校正、写入、清理）
//! - `transform`：图片变换服务
//! - `redirect`：跳转结果与提示参数
//! - `status`：用户提示与管理员诊断文案

pub mod action;
pub mod handler;
pub mod redirect;
pub mod status;
pub mod transform;

pub use action::{PictureUploadAction, UploadError, UploadOutcome, UploadSettings};
pub use handler::create_picture_router;
pub use redirect::{PageNotice, RedirectResult};
pub use transform::{CompositeTransform, ImageTransformer, PngTransformer, Transform};
