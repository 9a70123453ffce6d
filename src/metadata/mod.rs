// metadata/mod.rs - 图片元数据提取
//! 从 PNG / WebP 图片中读取生成参数文本和尺寸，并构建索引记录

mod params;
mod png;
mod webp;

#[cfg(test)]
pub(crate) mod fixtures;

pub use params::*;
pub use self::png::read_png;
pub use self::webp::read_webp;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::schema::MetadataRecord;

/// 元数据提取错误类型
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("no parameters found")]
    NoParametersFound,

    #[error("parameter format is not supported: {0}")]
    UnsupportedParameterFormat(String),

    #[error("failed to decode image: {0}")]
    FormatDecode(String),

    #[error("file type not supported: {0}")]
    UnsupportedFileType(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MetadataError {
    /// 文本存在但无法解析（区别于读取失败）
    pub fn is_parse_error(&self) -> bool {
        matches!(self, MetadataError::UnsupportedParameterFormat(_))
    }
}

impl From<image::ImageError> for MetadataError {
    fn from(e: image::ImageError) -> Self {
        MetadataError::FormatDecode(e.to_string())
    }
}

impl From<::png::DecodingError> for MetadataError {
    fn from(e: ::png::DecodingError) -> Self {
        MetadataError::FormatDecode(e.to_string())
    }
}

impl From<exif::Error> for MetadataError {
    fn from(e: exif::Error) -> Self {
        MetadataError::FormatDecode(e.to_string())
    }
}

/// 支持的图片容器格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    WebP,
}

impl ImageFormat {
    /// 根据扩展名判断格式（不区分大小写）
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "png" => Some(ImageFormat::Png),
            "webp" => Some(ImageFormat::WebP),
            _ => None,
        }
    }
}

/// 从容器中读出的原始数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMetadata {
    pub text: String,
    pub width: u32,
    pub height: u32,
}

/// 读取图片文件中的原始参数文本和尺寸
pub fn read_raw_metadata(path: &Path) -> Result<RawMetadata, MetadataError> {
    let format = ImageFormat::from_path(path)
        .ok_or_else(|| MetadataError::UnsupportedFileType(path.display().to_string()))?;

    let reader = BufReader::new(File::open(path)?);
    match format {
        ImageFormat::Png => read_png(reader),
        ImageFormat::WebP => read_webp(reader),
    }
}

/// 读取 -> 解析 -> 构建记录
pub fn parse_image_file(path: &Path, parser: &ParameterParser) -> Result<MetadataRecord, MetadataError> {
    let modified = std::fs::metadata(path)?.modified()?;

    let raw = read_raw_metadata(path)?;
    let fields = parser.parse(&raw.text)?;

    Ok(MetadataRecord::build(fields, raw.width, raw.height, modified))
}
