// schema/mod.rs - Schema 定义模块
//! 定义索引的 Schema 结构和记录类型

mod document;
pub mod fields;

pub use document::*;
pub use fields::*;

use tantivy::schema::{Schema, SchemaBuilder, FAST, INDEXED, STORED, STRING, TEXT};

/// 创建图片元数据 Schema
pub fn build_schema() -> Schema {
    let mut schema_builder = SchemaBuilder::default();

    // === 主键 ===
    // 完整路径（精确匹配 + 存储）
    schema_builder.add_text_field(FIELD_PATH, STRING | STORED);

    // === 全文字段 ===
    schema_builder.add_text_field(FIELD_PROMPT, TEXT | STORED);
    schema_builder.add_text_field(FIELD_NEGATIVE_PROMPT, TEXT | STORED);

    // === 过滤字段 ===
    // 模型名称按整体匹配
    schema_builder.add_text_field(FIELD_CHECKPOINT, STRING | STORED);
    // 像素数，用于尺寸分档
    schema_builder.add_u64_field(FIELD_PIXEL, INDEXED | FAST | STORED);
    // 创建时间，用于范围过滤和排序
    schema_builder.add_date_field(FIELD_CREATION_TIME, INDEXED | FAST | STORED);

    // === 其他参数 ===
    schema_builder.add_json_field(FIELD_METADATA, TEXT);
    // 完整记录（仅存储，用于读回）
    schema_builder.add_text_field(FIELD_RECORD, STORED);

    schema_builder.build()
}
