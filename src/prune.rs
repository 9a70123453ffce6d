// prune.rs - 索引清理
// 分页遍历索引，删除对应文件已不存在的条目
use std::fs;
use std::io::ErrorKind;

use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::engine::RecordStore;
use crate::indexer::IndexingError;

/// 清理统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneStats {
    pub visited: usize,
    pub removed: usize,
    pub stat_failed: usize,
}

/// 清理索引中失效的条目
///
/// 每删除一条，下一页的偏移量就减一，避免删除后结果集收缩导致漏看条目。
/// 文件状态读取失败（非不存在）时保留该条目。
pub fn prune_index<S: RecordStore + ?Sized>(
    store: &S,
    page_size: usize,
    cancel: &CancelToken,
) -> Result<PruneStats, IndexingError> {
    let page_size = page_size.max(1);
    let mut offset = 0;
    let mut stats = PruneStats::default();

    info!("开始清理索引");
    loop {
        if cancel.is_cancelled() {
            info!("清理已取消");
            return Err(IndexingError::Cancelled);
        }

        let page = store.scan_page(page_size, offset)?;
        if page.is_empty() {
            break;
        }
        offset += page.len();

        let mut missing = Vec::new();
        for entry in page {
            stats.visited += 1;
            match fs::metadata(&entry.key) {
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    info!("从索引中移除 {}", entry.key);
                    missing.push(entry.key);
                }
                Err(e) => {
                    warn!("无法读取文件状态 {}: {}", entry.key, e);
                    stats.stat_failed += 1;
                }
            }
        }

        if !missing.is_empty() {
            store.delete_batch(&missing)?;
            offset -= missing.len();
            stats.removed += missing.len();
        }
    }

    info!(
        "清理完成: 检查 {} 条, 移除 {} 条",
        stats.visited, stats.removed
    );
    Ok(stats)
}
