// query/filter.rs - 过滤条件构建器
//! 将 ImageQuery 转换为 Tantivy 查询

use std::ops::Bound;

use chrono::{DateTime, Utc};
use tantivy::query::{AllQuery, BooleanQuery, Occur, PhraseQuery, Query, RangeQuery, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Schema};
use tantivy::tokenizer::TokenStream;
use tantivy::{Index, Term};

use crate::api::{ImageQuery, SizeBucket};
use crate::engine::{EngineError, EngineResult};
use crate::schema::fields::*;

/// 过滤器构建器
pub struct FilterBuilder<'a> {
    index: &'a Index,
    schema: Schema,
}

impl<'a> FilterBuilder<'a> {
    pub fn new(index: &'a Index) -> Self {
        Self { index, schema: index.schema() }
    }

    /// 构建完整查询，所有条件同时满足；无条件时匹配全部
    pub fn build_query(&self, query: &ImageQuery) -> EngineResult<Box<dyn Query>> {
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();

        if let Some(prompt) = query.prompt.as_deref() {
            if let Some(q) = self.build_prompt_query(prompt)? {
                clauses.push((Occur::Must, q));
            }
        }

        if let Some(checkpoint) = query.checkpoint.as_deref() {
            clauses.push((Occur::Must, self.build_checkpoint_query(checkpoint)?));
        }

        if let Some(size) = query.size {
            clauses.push((Occur::Must, self.build_size_query(size)?));
        }

        if query.after.is_some() || query.before.is_some() {
            clauses.push((Occur::Must, self.build_time_query(query.after, query.before)?));
        }

        if clauses.is_empty() {
            Ok(Box::new(AllQuery))
        } else {
            Ok(Box::new(BooleanQuery::new(clauses)))
        }
    }

    fn field(&self, name: &str) -> EngineResult<Field> {
        self.schema.get_field(name)
            .map_err(|_| EngineError::Config(format!("Missing field: {name}")))
    }

    /// prompt 短语查询，分词方式与写入时一致
    fn build_prompt_query(&self, text: &str) -> EngineResult<Option<Box<dyn Query>>> {
        let field = self.field(FIELD_PROMPT)?;
        let mut analyzer = self.index.tokenizer_for_field(field)?;
        let mut stream = analyzer.token_stream(text);

        let mut terms = Vec::new();
        while stream.advance() {
            terms.push(Term::from_field_text(field, &stream.token().text));
        }

        Ok(match terms.len() {
            0 => None,
            1 => {
                let term = terms.remove(0);
                Some(Box::new(TermQuery::new(term, IndexRecordOption::Basic)))
            }
            _ => Some(Box::new(PhraseQuery::new(terms))),
        })
    }

    /// 模型名称精确匹配
    fn build_checkpoint_query(&self, checkpoint: &str) -> EngineResult<Box<dyn Query>> {
        let field = self.field(FIELD_CHECKPOINT)?;
        let term = Term::from_field_text(field, checkpoint);
        Ok(Box::new(TermQuery::new(term, IndexRecordOption::Basic)))
    }

    /// 像素数分档
    fn build_size_query(&self, size: SizeBucket) -> EngineResult<Box<dyn Query>> {
        let field = self.field(FIELD_PIXEL)?;
        let term = |pixels: &u64| Term::from_field_u64(field, *pixels);

        let (lower, upper) = size.bounds();
        Ok(Box::new(RangeQuery::new(lower.as_ref().map(term), upper.as_ref().map(term))))
    }

    /// 创建时间范围：下界含，上界不含，精确到秒
    fn build_time_query(
        &self,
        after: Option<DateTime<Utc>>,
        before: Option<DateTime<Utc>>,
    ) -> EngineResult<Box<dyn Query>> {
        let field = self.field(FIELD_CREATION_TIME)?;
        let term = |t: DateTime<Utc>| {
            Term::from_field_date(field, tantivy::DateTime::from_timestamp_secs(t.timestamp()))
        };

        let lower = after.map_or(Bound::Unbounded, |t| Bound::Included(term(t)));
        let upper = before.map_or(Bound::Unbounded, |t| Bound::Excluded(term(t)));
        Ok(Box::new(RangeQuery::new(lower, upper)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::build_schema;

    #[test]
    fn test_empty_query_matches_all() {
        let index = Index::create_in_ram(build_schema());
        let query = FilterBuilder::new(&index).build_query(&ImageQuery::new()).unwrap();
        assert!(format!("{:?}", query).contains("AllQuery"));
    }

    #[test]
    fn test_blank_prompt_is_ignored() {
        let index = Index::create_in_ram(build_schema());
        let query = FilterBuilder::new(&index)
            .build_query(&ImageQuery::new().with_prompt("  , "))
            .unwrap();
        assert!(format!("{:?}", query).contains("AllQuery"));
    }

    #[test]
    fn test_combined_query() {
        let index = Index::create_in_ram(build_schema());
        let query = FilterBuilder::new(&index)
            .build_query(
                &ImageQuery::new()
                    .with_prompt("black cat")
                    .with_checkpoint("foo")
                    .with_size(SizeBucket::Medium),
            )
            .unwrap();
        let debug = format!("{:?}", query);
        assert!(debug.contains("BooleanQuery"));
        assert!(debug.contains("PhraseQuery"));
    }
}
