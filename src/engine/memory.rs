// engine/memory.rs - 内存记录存储（测试用）

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::schema::MetadataRecord;

use super::core::{EngineError, EngineResult, IndexEntry, RecordStore};

/// 按 key 排序的内存存储，可模拟提交失败
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, MetadataRecord>>,
    fail_commits: AtomicBool,
    /// 包括被拒绝的提交
    pub attempts: AtomicUsize,
    pub commits: AtomicUsize,
    pub pages: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub fn keys(&self) -> Vec<String> {
        self.records.lock().unwrap().keys().cloned().collect()
    }

    pub fn get(&self, key: &str) -> Option<MetadataRecord> {
        self.records.lock().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

impl RecordStore for MemoryStore {
    fn commit_batch(&self, entries: &[IndexEntry]) -> EngineResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(EngineError::Index("commit rejected".to_string()));
        }
        let mut records = self.records.lock().unwrap();
        for entry in entries {
            records.insert(entry.key.clone(), entry.record.clone());
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn delete_batch(&self, keys: &[String]) -> EngineResult<()> {
        let mut records = self.records.lock().unwrap();
        for key in keys {
            records.remove(key);
        }
        Ok(())
    }

    fn scan_page(&self, page_size: usize, offset: usize) -> EngineResult<Vec<IndexEntry>> {
        self.pages.fetch_add(1, Ordering::SeqCst);
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .skip(offset)
            .take(page_size)
            .map(|(k, v)| IndexEntry::new(k.clone(), v.clone()))
            .collect())
    }
}
