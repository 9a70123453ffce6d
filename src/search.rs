// search.rs - 交互式检索输出
use std::io::Write;

use anyhow::Result;

use crate::api::ImageList;
use crate::engine::ImageIndex;
use crate::query::QueryParser;

/// 预览 prompt 的最大字符数
const PROMPT_PREVIEW_CHARS: usize = 120;

/// 解析一行输入并输出检索结果
pub fn run_query<W: Write>(index: &ImageIndex, parser: &QueryParser, input: &str, out: &mut W) -> Result<()> {
    let query = parser.parse(input)?;
    let list = index.search(&query)?;
    print_results(&list, out)
}

/// 输出分页结果
pub fn print_results<W: Write>(list: &ImageList, out: &mut W) -> Result<()> {
    if list.items.is_empty() {
        writeln!(out, "没有找到匹配的图片")?;
        return Ok(());
    }

    writeln!(
        out,
        "共 {} 张，第 {}/{} 页",
        list.total_items,
        list.current_page + 1,
        list.total_pages
    )?;
    for item in &list.items {
        let record = &item.record;
        writeln!(out, " {}", item.path)?;
        writeln!(out, "    模型: {}", display_or_dash(&record.checkpoint))?;
        writeln!(out, "    时间: {}", record.creation_time.format("%Y-%m-%d %H:%M:%S"))?;
        if let Some(size) = record.extra_fields.get(crate::metadata::SIZE_KEY) {
            writeln!(out, "    尺寸: {}", size)?;
        }
        writeln!(out, "    Prompt: {}", preview(&record.prompt))?;
    }
    if list.has_more() {
        writeln!(out, "（使用 --page={} 查看下一页）", list.current_page + 1)?;
    }
    Ok(())
}

/// 输出模型列表
pub fn print_checkpoints<W: Write>(checkpoints: &[String], out: &mut W) -> Result<()> {
    if checkpoints.is_empty() {
        writeln!(out, "索引中还没有模型信息")?;
        return Ok(());
    }
    for name in checkpoints {
        writeln!(out, " {}", name)?;
    }
    Ok(())
}

fn display_or_dash(s: &str) -> &str {
    if s.is_empty() { "-" } else { s }
}

fn preview(s: &str) -> String {
    if s.chars().count() <= PROMPT_PREVIEW_CHARS {
        return s.to_string();
    }
    let mut out: String = s.chars().take(PROMPT_PREVIEW_CHARS).collect();
    out.push_str("...");
    out
}
