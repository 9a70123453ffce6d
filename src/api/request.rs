// api/request.rs - 图片搜索请求类型
//! 定义图片搜索请求的结构化类型

use std::ops::Bound;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 小图上限（含）
pub const SMALL_MAX_PIXELS: u64 = 512 * 768;
/// 中图上限（含）
pub const MEDIUM_MAX_PIXELS: u64 = 512 * 768 * 4;

/// 图片搜索请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageQuery {
    /// 在 prompt 中按短语匹配
    #[serde(default)]
    pub prompt: Option<String>,

    /// 模型名称（精确匹配）
    #[serde(default)]
    pub checkpoint: Option<String>,

    /// 尺寸分档
    #[serde(default)]
    pub size: Option<SizeBucket>,

    /// 创建时间下界（含）
    #[serde(default)]
    pub after: Option<DateTime<Utc>>,

    /// 创建时间上界（不含）
    #[serde(default)]
    pub before: Option<DateTime<Utc>>,

    /// 按创建时间排序
    #[serde(default)]
    pub order: SortOrder,

    /// 页码，从 0 开始
    #[serde(default)]
    pub page: usize,

    /// 每页数量
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize { 20 }

impl Default for ImageQuery {
    fn default() -> Self {
        Self {
            prompt: None,
            checkpoint: None,
            size: None,
            after: None,
            before: None,
            order: SortOrder::default(),
            page: 0,
            limit: default_limit(),
        }
    }
}

impl ImageQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_checkpoint(mut self, checkpoint: impl Into<String>) -> Self {
        self.checkpoint = Some(checkpoint.into());
        self
    }

    pub fn with_size(mut self, size: SizeBucket) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// 结果偏移量，页码过大导致溢出时为 None
    pub fn offset(&self) -> Option<usize> {
        self.page.checked_mul(self.limit.max(1))
    }
}

/// 尺寸分档
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeBucket {
    /// 像素数 <= 512×768
    Small,
    /// 512×768 < 像素数 <= 4×512×768
    Medium,
    /// 像素数 > 4×512×768
    Large,
}

impl SizeBucket {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "small" => Some(SizeBucket::Small),
            "medium" => Some(SizeBucket::Medium),
            "large" => Some(SizeBucket::Large),
            _ => None,
        }
    }

    /// 分档对应的像素数区间
    pub fn bounds(&self) -> (Bound<u64>, Bound<u64>) {
        match self {
            SizeBucket::Small => (Bound::Unbounded, Bound::Included(SMALL_MAX_PIXELS)),
            SizeBucket::Medium => (
                Bound::Excluded(SMALL_MAX_PIXELS),
                Bound::Included(MEDIUM_MAX_PIXELS),
            ),
            SizeBucket::Large => (Bound::Excluded(MEDIUM_MAX_PIXELS), Bound::Unbounded),
        }
    }
}

/// 排序方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// 最旧优先
    Asc,
    /// 最新优先（默认）
    #[default]
    Desc,
}
