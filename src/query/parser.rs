// query/parser.rs - 查询解析器
//! 解析交互输入：自由文本 + 结构化过滤语法
//!
//! 支持的语法:
//! - 自由文本: "black cat"，按短语匹配 prompt
//! - 模型: --checkpoint=foo 或 --checkpoint="model with spaces"
//! - 尺寸: --size=small|medium|large
//! - 时间范围: --after=2024-01-01 --before=2024-12-31
//! - 排序: --order=asc|desc
//! - 分页: --page=0 --limit=20

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::api::{ImageQuery, SizeBucket, SortOrder};

/// 查询解析错误
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum QueryError {
    #[error("Unknown option: --{0}")]
    UnknownOption(String),

    #[error("Invalid value for --{key}: {value}")]
    InvalidValue { key: String, value: String },
}

// 正则表达式预编译
static ARG_PATTERN: Lazy<Regex> = Lazy::new(|| {
    // 匹配 --key=value 或 --key="value with spaces"
    Regex::new(r#"--([a-z\-]+)=(?:"([^"]+)"|([^\s]+))"#).unwrap()
});

/// 查询解析器
pub struct QueryParser {
    default_limit: usize,
}

impl QueryParser {
    /// 创建新的解析器
    pub fn new() -> Self {
        Self { default_limit: 20 }
    }

    /// 未指定 --limit 时使用的每页数量
    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    /// 解析查询字符串
    pub fn parse(&self, input: &str) -> Result<ImageQuery, QueryError> {
        let input = input.trim();
        let mut query = ImageQuery::new().with_limit(self.default_limit);
        let mut text_parts: Vec<&str> = Vec::new();

        // 提取所有 --key=value 参数
        let mut last_end = 0;
        for cap in ARG_PATTERN.captures_iter(input) {
            let Some(full_match) = cap.get(0) else { continue };

            // 收集参数之前的文本
            if full_match.start() > last_end {
                text_parts.push(input[last_end..full_match.start()].trim());
            }
            last_end = full_match.end();

            let key = cap.get(1).map(|m| m.as_str()).unwrap_or_default();
            // 优先使用带引号的值，否则使用不带引号的值
            let value = cap.get(2)
                .or_else(|| cap.get(3))
                .map(|m| m.as_str())
                .unwrap_or_default();

            self.apply(&mut query, key, value)?;
        }

        // 收集最后一个参数之后的文本
        if last_end < input.len() {
            text_parts.push(input[last_end..].trim());
        }

        let text = text_parts.iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(" ");
        if !text.is_empty() {
            query.prompt = Some(text);
        }

        // 页码乘每页数量必须能表示为偏移量
        if query.offset().is_none() {
            return Err(QueryError::InvalidValue {
                key: "page".to_string(),
                value: query.page.to_string(),
            });
        }

        Ok(query)
    }

    fn apply(&self, query: &mut ImageQuery, key: &str, value: &str) -> Result<(), QueryError> {
        let invalid = || QueryError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };

        match key {
            "checkpoint" => query.checkpoint = Some(value.to_string()),
            "size" => query.size = Some(SizeBucket::parse(value).ok_or_else(invalid)?),
            "after" => query.after = Some(parse_date(value).ok_or_else(invalid)?),
            "before" => query.before = Some(parse_date(value).ok_or_else(invalid)?),
            "order" => {
                query.order = match value.to_lowercase().as_str() {
                    "asc" => SortOrder::Asc,
                    "desc" => SortOrder::Desc,
                    _ => return Err(invalid()),
                }
            }
            "page" => query.page = value.parse().map_err(|_| invalid())?,
            "limit" => {
                query.limit = value.parse().ok().filter(|n| *n > 0).ok_or_else(invalid)?
            }
            _ => return Err(QueryError::UnknownOption(key.to_string())),
        }
        Ok(())
    }
}

impl Default for QueryParser {
    fn default() -> Self {
        Self::new()
    }
}

/// 解析日期字符串 (YYYY-MM-DD)，取当天 00:00 UTC
fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}
