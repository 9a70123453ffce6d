// schema/fields.rs - 字段名常量定义
//! 统一管理所有 Schema 字段名，避免魔法字符串

/// 完整文件路径（索引主键）
pub const FIELD_PATH: &str = "path";
/// 正向提示词
pub const FIELD_PROMPT: &str = "prompt";
/// 反向提示词
pub const FIELD_NEGATIVE_PROMPT: &str = "negative_prompt";
/// 模型名称
pub const FIELD_CHECKPOINT: &str = "checkpoint";
/// 像素数（宽 × 高）
pub const FIELD_PIXEL: &str = "pixel";
/// 文件修改时间
pub const FIELD_CREATION_TIME: &str = "creation_time";
/// 其他生成参数（JSON 对象）
pub const FIELD_METADATA: &str = "metadata";
/// 序列化后的完整记录
pub const FIELD_RECORD: &str = "record";
