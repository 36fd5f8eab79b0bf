//! 上传暂存子系统
//!
//! 浏览器提交的文件先被暂存到暂存桶，随后交给头像上传处理流程校验/转换；
//! 暂存文件的生命周期由上传处理流程负责（用完即删）。

mod staging;

pub use staging::{BlobInfo, BlobLookupError, MultipartUpload, UploadSource};
