use std::future::Future;
use std::io::Cursor;

use axum::body::Bytes;
use image::{DynamicImage, ImageFormat};

use crate::error::TransformError;

/// 单步图片变换
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    FlipHorizontal,
    FlipVertical,
}

/// 按顺序执行的组合变换
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompositeTransform {
    steps: Vec<Transform>,
}

impl CompositeTransform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, step: Transform) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(&self) -> &[Transform] {
        &self.steps
    }

    /// 头像镜像校正：连续两次水平翻转。
    ///
    /// 两次翻转净效果为恒等，但会把任意输入统一重编码为 PNG。
    pub fn mirror_correction() -> Self {
        Self::new()
            .then(Transform::FlipHorizontal)
            .then(Transform::FlipHorizontal)
    }
}

/// 图片变换服务，输出 PNG 字节
pub trait ImageTransformer: Send + Sync {
    fn apply(
        &self,
        transform: &CompositeTransform,
        data: Bytes,
    ) -> impl Future<Output = Result<Vec<u8>, TransformError>> + Send;
}

/// 基于 image crate 的实现（解码/翻转/编码放在阻塞线程池）
#[derive(Debug, Clone, Copy, Default)]
pub struct PngTransformer;

fn apply_blocking(steps: &[Transform], data: &[u8]) -> Result<Vec<u8>, TransformError> {
    let mut img: DynamicImage =
        image::load_from_memory(data).map_err(|e| TransformError::Decode(e.to_string()))?;
    for step in steps {
        img = match step {
            Transform::FlipHorizontal => img.fliph(),
            Transform::FlipVertical => img.flipv(),
        };
    }
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .map_err(|e| TransformError::Encode(e.to_string()))?;
    Ok(out.into_inner())
}

impl ImageTransformer for PngTransformer {
    async fn apply(
        &self,
        transform: &CompositeTransform,
        data: Bytes,
    ) -> Result<Vec<u8>, TransformError> {
        let steps = transform.steps().to_vec();
        tokio::task::spawn_blocking(move || apply_blocking(&steps, &data))
            .await
            .map_err(|e| TransformError::Task(e.to_string()))?
    }
}
