// api/response.rs - 图片搜索响应类型
//! 定义搜索结果的结构化响应类型

use serde::{Deserialize, Serialize};

use crate::schema::MetadataRecord;

/// 单条结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageItem {
    /// 图片文件路径（索引主键）
    pub path: String,
    /// 元数据记录
    #[serde(flatten)]
    pub record: MetadataRecord,
}

/// 搜索响应（分页）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageList {
    pub items: Vec<ImageItem>,
    /// 当前页码，从 0 开始
    pub current_page: usize,
    /// 总匹配数（不考虑分页）
    pub total_items: usize,
    pub total_pages: usize,
}

impl ImageList {
    pub fn new(items: Vec<ImageItem>, page: usize, limit: usize, total: usize) -> Self {
        let total_pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
        Self {
            items,
            current_page: page,
            total_items: total,
            total_pages,
        }
    }

    /// 是否还有下一页
    pub fn has_more(&self) -> bool {
        self.current_page < self.total_pages.saturating_sub(1)
    }
}
