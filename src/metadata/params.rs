// metadata/params.rs - 生成参数解析器
//! 解析图片中嵌入的生成参数文本
//!
//! 文本分两段处理:
//! - 锚点段: `<prompt> [Negative prompt: <negative>] Steps: <n>, `，全文必须恰好匹配一次
//! - 尾部段: 逗号分隔的 `Key: Value` 列表，值可以是带引号的字符串或 `{...}` 结构

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use super::MetadataError;

/// 正向提示词
pub const PROMPT_KEY: &str = "Prompt";
/// 反向提示词
pub const NEGATIVE_PROMPT_KEY: &str = "Negative Prompt";
/// 采样步数
pub const STEPS_KEY: &str = "Steps";
/// 模型（checkpoint）
pub const CHECKPOINT_KEY: &str = "Model";
/// 图片尺寸（由记录构建时合成）
pub const SIZE_KEY: &str = "Size";

// 锚点正则预编译
static ANCHOR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(.*?)\s*(?:Negative prompt: (.+?)\s*)?Steps: (\d+), ").unwrap()
});

/// `{}` 嵌套的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BraceNesting {
    /// 只有一层：遇到第一个 `}` 就结束结构值
    Shallow,
    /// 计数嵌套深度，`}` 与 `{` 配对后才结束
    #[default]
    Nested,
}

/// 参数解析器，构建后只读，可在线程间共享
#[derive(Debug, Clone)]
pub struct ParameterParser {
    anchor: Regex,
    nesting: BraceNesting,
}

impl ParameterParser {
    pub fn new() -> Self {
        Self {
            anchor: ANCHOR_PATTERN.clone(),
            nesting: BraceNesting::default(),
        }
    }

    pub fn with_nesting(mut self, nesting: BraceNesting) -> Self {
        self.nesting = nesting;
        self
    }

    /// 解析参数文本，返回按出现顺序排列的字段
    pub fn parse(&self, text: &str) -> Result<IndexMap<String, String>, MetadataError> {
        let text = text.replace("\r\n", " ").replace('\n', " ");

        let matches: Vec<_> = self.anchor.captures_iter(&text).take(2).collect();
        if matches.len() != 1 {
            return Err(MetadataError::UnsupportedParameterFormat(text));
        }
        let caps = &matches[0];

        let mut fields = IndexMap::new();
        fields.insert(PROMPT_KEY.to_string(), caps[1].to_string());
        fields.insert(
            NEGATIVE_PROMPT_KEY.to_string(),
            caps.get(2).map(|m| m.as_str()).unwrap_or("").to_string(),
        );
        fields.insert(STEPS_KEY.to_string(), caps[3].to_string());

        let anchor_end = caps.get(0).map(|m| m.end()).unwrap_or(0);
        for (key, value) in split_pairs(&text[anchor_end..], self.nesting) {
            fields.insert(key, value);
        }

        Ok(fields)
    }
}

impl Default for ParameterParser {
    fn default() -> Self {
        Self::new()
    }
}

/// 尾部扫描状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// 普通文本，`:` 和 `,` 生效
    Unquoted,
    /// 双引号字符串内
    Quoted,
    /// `{...}` 结构内，`quoted` 表示是否处于结构内的字符串
    Structured { depth: usize, quoted: bool },
}

fn trim_spaces(s: &str) -> String {
    s.trim_matches(' ').to_string()
}

/// 将尾部文本切分为 (key, value) 列表
fn split_pairs(input: &str, nesting: BraceNesting) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut state = ScanState::Unquoted;
    let mut start = 0;
    let mut key: Option<String> = None;

    let mut chars = input.char_indices();
    while let Some((i, c)) = chars.next() {
        state = match (state, c) {
            (ScanState::Unquoted, '"') => ScanState::Quoted,
            (ScanState::Unquoted, '{') => ScanState::Structured { depth: 1, quoted: false },
            (ScanState::Unquoted, ':') if key.is_none() => {
                key = Some(trim_spaces(&input[start..i]));
                start = i + 1;
                ScanState::Unquoted
            }
            (ScanState::Unquoted, ',') => {
                // 没有 key 的片段直接丢弃
                if let Some(k) = key.take() {
                    pairs.push((k, trim_spaces(&input[start..i])));
                }
                start = i + 1;
                ScanState::Unquoted
            }

            (ScanState::Quoted, '\\') => {
                chars.next();
                ScanState::Quoted
            }
            (ScanState::Quoted, '"') => ScanState::Unquoted,

            (ScanState::Structured { depth, quoted: true }, '\\') => {
                chars.next();
                ScanState::Structured { depth, quoted: true }
            }
            (ScanState::Structured { depth, quoted }, '"') => {
                ScanState::Structured { depth, quoted: !quoted }
            }
            (ScanState::Structured { depth, quoted: false }, '{') => match nesting {
                BraceNesting::Nested => ScanState::Structured { depth: depth + 1, quoted: false },
                BraceNesting::Shallow => ScanState::Structured { depth, quoted: false },
            },
            (ScanState::Structured { depth, quoted: false }, '}') => {
                if depth <= 1 || nesting == BraceNesting::Shallow {
                    ScanState::Unquoted
                } else {
                    ScanState::Structured { depth: depth - 1, quoted: false }
                }
            }

            (state, _) => state,
        };
    }

    if let Some(k) = key {
        pairs.push((k, trim_spaces(&input[start..])));
    }

    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROMPT: &str = "masterpiece, best quality, a cat sitting on a windowsill";
    const NEGATIVE: &str = "lowres, bad anatomy, blurry";
    const CHECKPOINT: &str = "dreamshaper_8";

    fn parse(text: &str) -> IndexMap<String, String> {
        ParameterParser::new().parse(text).unwrap()
    }

    fn assert_anchor(res: &IndexMap<String, String>, prompt: &str, negative: &str) {
        assert_eq!(res[PROMPT_KEY], prompt);
        assert_eq!(res[NEGATIVE_PROMPT_KEY], negative);
        assert_eq!(res[STEPS_KEY], "20");
        assert_eq!(res[CHECKPOINT_KEY], CHECKPOINT);
    }

    #[test]
    fn test_simple_text() {
        let res = parse("A cat. Negative prompt: ugly Steps: 20, Model: foo");
        assert_eq!(res[PROMPT_KEY], "A cat.");
        assert_eq!(res[NEGATIVE_PROMPT_KEY], "ugly");
        assert_eq!(res[STEPS_KEY], "20");
        assert_eq!(res[CHECKPOINT_KEY], "foo");
        assert_eq!(res.len(), 4);
    }

    #[test]
    fn test_full_text() {
        let text = format!("{PROMPT} Negative prompt: {NEGATIVE} Steps: 20, Model: {CHECKPOINT}");
        let res = parse(&text);
        assert_anchor(&res, PROMPT, NEGATIVE);
        assert_eq!(res.len(), 4);
    }

    #[test]
    fn test_punctuation_before_markers_is_kept() {
        let res = parse(&format!("{PROMPT},Negative prompt: {NEGATIVE} Steps: 20, Model: {CHECKPOINT}"));
        assert_anchor(&res, &format!("{PROMPT},"), NEGATIVE);

        let res = parse(&format!("{PROMPT}.Negative prompt: {NEGATIVE} Steps: 20, Model: {CHECKPOINT}"));
        assert_anchor(&res, &format!("{PROMPT}."), NEGATIVE);

        let res = parse(&format!("{PROMPT} Negative prompt: {NEGATIVE},Steps: 20, Model: {CHECKPOINT}"));
        assert_anchor(&res, PROMPT, &format!("{NEGATIVE},"));

        let res = parse(&format!("{PROMPT} Negative prompt: {NEGATIVE}.Steps: 20, Model: {CHECKPOINT}"));
        assert_anchor(&res, PROMPT, &format!("{NEGATIVE}."));
    }

    #[test]
    fn test_markers_without_space() {
        let res = parse(&format!("{PROMPT}Negative prompt: {NEGATIVE} Steps: 20, Model: {CHECKPOINT}"));
        assert_anchor(&res, PROMPT, NEGATIVE);

        let res = parse(&format!("{PROMPT} Negative prompt: {NEGATIVE}Steps: 20, Model: {CHECKPOINT}"));
        assert_anchor(&res, PROMPT, NEGATIVE);
    }

    #[test]
    fn test_trailing_separator() {
        let res = parse(&format!(
            "{PROMPT} Negative prompt: {NEGATIVE} Steps: 20, Model: {CHECKPOINT}, "
        ));
        assert_anchor(&res, PROMPT, NEGATIVE);
        assert_eq!(res.len(), 4);
    }

    #[test]
    fn test_missing_negative_prompt() {
        let res = parse(&format!("{PROMPT} Steps: 20, Model: {CHECKPOINT}"));
        assert_anchor(&res, PROMPT, "");
        assert!(res.contains_key(NEGATIVE_PROMPT_KEY));
    }

    #[test]
    fn test_additional_params() {
        let res = parse(&format!(
            "{PROMPT} Negative prompt: {NEGATIVE} Steps: 20, Model: {CHECKPOINT}, Param1: abc, Param2: 123 456"
        ));
        assert_anchor(&res, PROMPT, NEGATIVE);
        assert_eq!(res["Param1"], "abc");
        assert_eq!(res["Param2"], "123 456");
        assert_eq!(res.len(), 6);
    }

    #[test]
    fn test_quoted_value() {
        let res = parse(&format!(
            r#"{PROMPT} Negative prompt: {NEGATIVE} Steps: 20, Model: {CHECKPOINT}, AdditionalParams: "p1: abc, p2: 456", Param1: abc"#
        ));
        assert_anchor(&res, PROMPT, NEGATIVE);
        assert_eq!(res["AdditionalParams"], r#""p1: abc, p2: 456""#);
        assert_eq!(res["Param1"], "abc");
        assert_eq!(res.len(), 6);

        let res = parse(r#"x Steps: 20, Note: "a, b", Other: x"#);
        assert_eq!(res["Note"], r#""a, b""#);
        assert_eq!(res["Other"], "x");
    }

    #[test]
    fn test_escaped_quote_in_value() {
        let res = parse(r#"x Steps: 20, Note: "say \"hi, there\"", Other: x"#);
        assert_eq!(res["Note"], r#""say \"hi, there\"""#);
        assert_eq!(res["Other"], "x");
    }

    #[test]
    fn test_structured_value() {
        let res = parse(&format!(
            r#"{PROMPT} Negative prompt: {NEGATIVE} Steps: 20, Model: {CHECKPOINT}, Hashes: {{"vae": "abc", "embed:123": "456"}}, Param1: abc"#
        ));
        assert_anchor(&res, PROMPT, NEGATIVE);
        assert_eq!(res["Hashes"], r#"{"vae": "abc", "embed:123": "456"}"#);
        assert_eq!(res["Param1"], "abc");

        let res = parse(r#"x Steps: 20, Hashes: {"a": "1", "b": "2"}, Other: x"#);
        assert_eq!(res["Hashes"], r#"{"a": "1", "b": "2"}"#);
        assert_eq!(res["Other"], "x");
    }

    #[test]
    fn test_nested_structured_value() {
        let text = r#"x Steps: 20, Extra: {"a": {"b": 1, "c": 2}, "d": 3}, Other: x"#;

        let res = parse(text);
        assert_eq!(res["Extra"], r#"{"a": {"b": 1, "c": 2}, "d": 3}"#);
        assert_eq!(res["Other"], "x");

        // 浅层模式下第一个 `}` 就结束结构值
        let res = ParameterParser::new()
            .with_nesting(BraceNesting::Shallow)
            .parse(text)
            .unwrap();
        assert_eq!(res["Extra"], r#"{"a": {"b": 1, "c": 2}"#);
        assert_eq!(res["Other"], "x");
    }

    #[test]
    fn test_brace_inside_string_in_structure() {
        let res = parse(r#"x Steps: 20, Extra: {"a": "}, b"}, Other: x"#);
        assert_eq!(res["Extra"], r#"{"a": "}, b"}"#);
        assert_eq!(res["Other"], "x");
    }

    #[test]
    fn test_colon_in_unquoted_value() {
        let res = parse("x Steps: 20, Time: 12:30, Other: y");
        assert_eq!(res["Time"], "12:30");
        assert_eq!(res["Other"], "y");
    }

    #[test]
    fn test_trailing_noise_without_key() {
        let res = parse("x Steps: 20, Model: foo, trailing noise");
        assert_eq!(res["Model"], "foo");
        assert_eq!(res.len(), 4);
        assert!(!res.contains_key(""));
    }

    #[test]
    fn test_duplicate_keys_overwrite() {
        let res = parse("x Steps: 20, Seed: 1, Sampler: Euler, Seed: 2");
        assert_eq!(res["Seed"], "2");
        let keys: Vec<_> = res.keys().map(String::as_str).collect();
        assert_eq!(keys, vec![PROMPT_KEY, NEGATIVE_PROMPT_KEY, STEPS_KEY, "Seed", "Sampler"]);
    }

    #[test]
    fn test_newlines_are_normalized() {
        let res = parse("a cat\nNegative prompt: ugly\nSteps: 20, Model: foo");
        assert_eq!(res[PROMPT_KEY], "a cat");
        assert_eq!(res[NEGATIVE_PROMPT_KEY], "ugly");
        assert_eq!(res[CHECKPOINT_KEY], "foo");
    }

    #[test]
    fn test_unsupported_text() {
        let err = ParameterParser::new().parse(PROMPT).unwrap_err();
        match err {
            MetadataError::UnsupportedParameterFormat(text) => assert_eq!(text, PROMPT),
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(ParameterParser::new().parse("").is_err());
    }

    #[test]
    fn test_multiple_anchors_rejected() {
        let text = "a Steps: 20, Model: foo, b Steps: 30, Model: bar";
        assert!(matches!(
            ParameterParser::new().parse(text),
            Err(MetadataError::UnsupportedParameterFormat(_))
        ));
    }

    #[test]
    fn test_parse_is_deterministic() {
        let text = r#"a cat Negative prompt: ugly Steps: 20, Sampler: Euler a, Hashes: {"a": "1"}, Model: foo"#;
        let parser = ParameterParser::new();
        let first = parser.parse(text).unwrap();
        let second = parser.parse(text).unwrap();
        assert_eq!(first, second);
        assert!(first.iter().eq(second.iter()));
    }
}
