// schema/document.rs - 索引记录结构定义
//! 每次扫描文件时重新构建，按文件路径覆盖写入索引

use std::time::SystemTime;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::metadata::{CHECKPOINT_KEY, NEGATIVE_PROMPT_KEY, PROMPT_KEY, SIZE_KEY};

/// 图片生成元数据记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MetadataRecord {
    pub prompt: String,
    pub negative_prompt: String,
    pub checkpoint: String,
    /// 宽 × 高，0 表示尺寸未知
    #[serde(rename = "pixel")]
    pub pixel_count: u64,
    /// 取自文件修改时间
    pub creation_time: DateTime<Utc>,
    /// 其余参数，不含 prompt / negative prompt / checkpoint
    #[serde(rename = "metadata")]
    pub extra_fields: IndexMap<String, String>,
}

impl MetadataRecord {
    /// 由解析出的字段、尺寸和文件时间构建记录
    pub fn build(
        mut fields: IndexMap<String, String>,
        width: u32,
        height: u32,
        modified: SystemTime,
    ) -> Self {
        fields.insert(SIZE_KEY.to_string(), format!("{}x{}", width, height));

        let prompt = fields.shift_remove(PROMPT_KEY).unwrap_or_default();
        let negative_prompt = fields.shift_remove(NEGATIVE_PROMPT_KEY).unwrap_or_default();
        let checkpoint = fields.shift_remove(CHECKPOINT_KEY).unwrap_or_default();

        Self {
            prompt,
            negative_prompt,
            checkpoint,
            pixel_count: u64::from(width) * u64::from(height),
            creation_time: DateTime::<Utc>::from(modified),
            extra_fields: fields,
        }
    }
}
