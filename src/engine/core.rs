// engine/core.rs - 索引引擎核心
//! 图片元数据索引：按路径存取记录、批量提交、分页遍历和检索

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock, RwLockWriteGuard};

use tantivy::{
    Index, IndexReader, IndexWriter, Order, TantivyDocument, Term,
    collector::{Count, TopDocs},
    query::{AllQuery, TermQuery},
    schema::{Field, IndexRecordOption, OwnedValue, Value},
};
use tracing::{debug, warn};

use crate::api::{ImageItem, ImageList, ImageQuery, SortOrder};
use crate::query::FilterBuilder;
use crate::schema::{MetadataRecord, FIELD_CREATION_TIME};

/// 索引引擎错误类型
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Directory error: {0}")]
    Directory(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// 索引中的一条记录，key 为图片的绝对路径
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub key: String,
    pub record: MetadataRecord,
}

impl IndexEntry {
    pub fn new(key: impl Into<String>, record: MetadataRecord) -> Self {
        Self { key: key.into(), record }
    }
}

/// 扫描器和清理器依赖的索引能力
pub trait RecordStore {
    /// 批量写入并提交，同一 key 的旧记录被替换；一批要么全部生效要么全部不生效
    fn commit_batch(&self, entries: &[IndexEntry]) -> EngineResult<()>;

    /// 批量删除并提交
    fn delete_batch(&self, keys: &[String]) -> EngineResult<()>;

    /// 按固定顺序分页读取全部记录
    fn scan_page(&self, page_size: usize, offset: usize) -> EngineResult<Vec<IndexEntry>>;

    fn put(&self, key: &str, record: &MetadataRecord) -> EngineResult<()> {
        self.commit_batch(&[IndexEntry::new(key, record.clone())])
    }

    fn delete(&self, key: &str) -> EngineResult<()> {
        self.delete_batch(&[key.to_string()])
    }
}

/// 基于 tantivy 的图片索引
pub struct ImageIndex {
    pub(crate) index: Index,
    pub(crate) writer: Arc<RwLock<IndexWriter>>,
    pub(crate) reader: IndexReader,
    /// 本次打开时是否新建了索引
    pub(crate) created: bool,

    // 字段缓存
    pub(crate) field_path: Field,
    pub(crate) field_prompt: Field,
    pub(crate) field_negative_prompt: Field,
    pub(crate) field_checkpoint: Field,
    pub(crate) field_pixel: Field,
    pub(crate) field_creation_time: Field,
    pub(crate) field_metadata: Field,
    pub(crate) field_record: Field,
}

impl ImageIndex {
    /// 索引是否为本次新建（调用方据此强制全量扫描）
    pub fn is_created(&self) -> bool {
        self.created
    }

    /// 图片检索
    pub fn search(&self, query: &ImageQuery) -> EngineResult<ImageList> {
        let searcher = self.reader.searcher();
        let tantivy_query = FilterBuilder::new(&self.index).build_query(query)?;

        let order = match query.order {
            SortOrder::Asc => Order::Asc,
            SortOrder::Desc => Order::Desc,
        };
        let limit = query.limit.max(1);
        let total = searcher.search(&tantivy_query, &Count)?;

        // 超出结果范围的页直接返回空页；取回数量不超过剩余结果数
        let offset = match query.offset() {
            Some(offset) if offset < total => offset,
            _ => return Ok(ImageList::new(Vec::new(), query.page, limit, total)),
        };
        let top_docs = TopDocs::with_limit(limit.min(total - offset))
            .and_offset(offset)
            .order_by_fast_field::<tantivy::DateTime>(FIELD_CREATION_TIME, order);

        let hits = searcher.search(&tantivy_query, &top_docs)?;

        let mut items = Vec::with_capacity(hits.len());
        for (_time, doc_address) in hits {
            let doc: TantivyDocument = searcher.doc(doc_address)?;
            let entry = self.read_entry(&doc)?;
            items.push(ImageItem {
                path: entry.key,
                record: entry.record,
            });
        }

        Ok(ImageList::new(items, query.page, limit, total))
    }

    /// 列出索引中出现过的模型名称
    pub fn checkpoints(&self) -> EngineResult<Vec<String>> {
        let searcher = self.reader.searcher();

        let mut names = BTreeSet::new();
        for segment_reader in searcher.segment_readers() {
            let inverted_index = segment_reader.inverted_index(self.field_checkpoint)?;
            let mut stream = inverted_index.terms().stream()?;
            while stream.advance() {
                names.insert(String::from_utf8_lossy(stream.key()).into_owned());
            }
        }

        // 词典中可能残留只属于已删除文档的名称
        let mut live = Vec::new();
        for name in names {
            if name.is_empty() {
                continue;
            }
            let term = Term::from_field_text(self.field_checkpoint, &name);
            let query = TermQuery::new(term, IndexRecordOption::Basic);
            if searcher.search(&query, &Count)? > 0 {
                live.push(name);
            }
        }
        Ok(live)
    }

    /// 获取索引统计
    pub fn stats(&self) -> EngineResult<EngineStats> {
        let searcher = self.reader.searcher();
        Ok(EngineStats {
            total_documents: searcher.num_docs() as usize,
        })
    }

    // === 私有方法 ===

    fn lock_writer(&self) -> EngineResult<RwLockWriteGuard<'_, IndexWriter>> {
        self.writer
            .write()
            .map_err(|_| EngineError::Index("index writer lock poisoned".to_string()))
    }

    /// 提交后立即刷新 reader，保证后续读取可见
    fn commit(&self, writer: &mut IndexWriter) -> EngineResult<()> {
        if let Err(e) = writer.commit() {
            if let Err(rollback_err) = writer.rollback() {
                warn!("提交失败后回滚也失败: {}", rollback_err);
            }
            return Err(e.into());
        }
        self.reader.reload()?;
        Ok(())
    }

    fn build_doc(&self, entry: &IndexEntry) -> EngineResult<TantivyDocument> {
        let record = &entry.record;
        let mut doc = TantivyDocument::new();

        doc.add_text(self.field_path, &entry.key);
        doc.add_text(self.field_prompt, &record.prompt);
        doc.add_text(self.field_negative_prompt, &record.negative_prompt);
        doc.add_text(self.field_checkpoint, &record.checkpoint);
        doc.add_u64(self.field_pixel, record.pixel_count);
        doc.add_date(
            self.field_creation_time,
            tantivy::DateTime::from_timestamp_secs(record.creation_time.timestamp()),
        );

        let metadata: BTreeMap<String, OwnedValue> = record
            .extra_fields
            .iter()
            .map(|(k, v)| (k.clone(), OwnedValue::Str(v.clone())))
            .collect();
        doc.add_object(self.field_metadata, metadata);

        doc.add_text(self.field_record, serde_json::to_string(record)?);
        Ok(doc)
    }

    fn read_entry(&self, doc: &TantivyDocument) -> EngineResult<IndexEntry> {
        let key = doc
            .get_first(self.field_path)
            .and_then(|v| v.as_str())
            .ok_or_else(|| EngineError::Index("document without path".to_string()))?
            .to_string();
        let raw = doc
            .get_first(self.field_record)
            .and_then(|v| v.as_str())
            .ok_or_else(|| EngineError::Index(format!("document without record: {key}")))?;

        Ok(IndexEntry {
            record: serde_json::from_str(raw)?,
            key,
        })
    }
}

impl RecordStore for ImageIndex {
    fn commit_batch(&self, entries: &[IndexEntry]) -> EngineResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let docs = entries
            .iter()
            .map(|entry| self.build_doc(entry))
            .collect::<EngineResult<Vec<_>>>()?;

        let mut writer = self.lock_writer()?;
        for (entry, doc) in entries.iter().zip(docs) {
            // 先删除旧的，再写入新的
            writer.delete_term(Term::from_field_text(self.field_path, &entry.key));
            if let Err(e) = writer.add_document(doc) {
                if let Err(rollback_err) = writer.rollback() {
                    warn!("写入失败后回滚也失败: {}", rollback_err);
                }
                return Err(e.into());
            }
        }
        self.commit(&mut writer)?;

        debug!("已提交 {} 条记录", entries.len());
        Ok(())
    }

    fn delete_batch(&self, keys: &[String]) -> EngineResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut writer = self.lock_writer()?;
        for key in keys {
            writer.delete_term(Term::from_field_text(self.field_path, key));
        }
        self.commit(&mut writer)?;

        debug!("已删除 {} 条记录", keys.len());
        Ok(())
    }

    fn scan_page(&self, page_size: usize, offset: usize) -> EngineResult<Vec<IndexEntry>> {
        if page_size == 0 {
            return Err(EngineError::Config("page size must be positive".to_string()));
        }
        let searcher = self.reader.searcher();
        let top_docs = TopDocs::with_limit(page_size).and_offset(offset);
        let hits = searcher.search(&AllQuery, &top_docs)?;

        let mut entries = Vec::with_capacity(hits.len());
        for (_score, doc_address) in hits {
            let doc: TantivyDocument = searcher.doc(doc_address)?;
            entries.push(self.read_entry(&doc)?);
        }
        Ok(entries)
    }
}

/// 引擎统计信息
#[derive(Debug, Clone)]
pub struct EngineStats {
    pub total_documents: usize,
}
