// indexer.rs - 增量扫描调度
// 遍历监控目录，按水位线跳过未变化的文件，其余读取、解析后分批提交到索引
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::cancel::CancelToken;
use crate::config::AppConfig;
use crate::engine::{EngineError, IndexEntry, RecordStore};
use crate::metadata::{parse_image_file, ParameterParser};
use crate::state::WatermarkStore;

/// 扫描 / 清理过程中向上传播的错误
#[derive(Debug, thiserror::Error)]
pub enum IndexingError {
    #[error("Traversal error at {}: {source}", path.display())]
    Traversal {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Index commit error: {0}")]
    IndexCommit(#[from] EngineError),

    #[error("Watermark error: {0:#}")]
    Watermark(anyhow::Error),

    #[error("Operation cancelled")]
    Cancelled,
}

impl From<walkdir::Error> for IndexingError {
    fn from(e: walkdir::Error) -> Self {
        let path = e.path().map(Path::to_path_buf).unwrap_or_default();
        IndexingError::Traversal { path, source: e.into() }
    }
}

/// 单次扫描的参数
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// 忽略水位线，重新读取全部文件
    pub force_full: bool,
    pub batch_size: usize,
    /// 小写扩展名
    pub extensions: Vec<String>,
    pub follow_symlinks: bool,
    /// 0 表示无限制
    pub max_depth: usize,
    pub skip_hidden: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ScanOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            force_full: false,
            batch_size: config.indexer.batch_size.max(1),
            extensions: config.walker.supported_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            follow_symlinks: config.walker.follow_symlinks,
            max_depth: config.walker.max_depth,
            skip_hidden: config.walker.skip_hidden,
        }
    }
}

impl ScanOptions {
    pub fn with_force_full(mut self, force_full: bool) -> Self {
        self.force_full = force_full;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.extensions.iter().any(|e| *e == ext))
    }
}

/// 待检查的文件
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// 文件相对水位线的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// 需要（重新）索引
    Stale,
    /// 修改时间早于水位线，跳过
    Fresh,
}

/// 只有修改时间严格早于水位线才跳过
pub fn freshness(modified: SystemTime, watermark: Option<SystemTime>) -> Freshness {
    match watermark {
        Some(mark) if modified < mark => Freshness::Fresh,
        _ => Freshness::Stale,
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// 按文件名排序遍历目录，产出支持的图片文件
///
/// 遍历错误作为 `Traversal` 产出，由调用方决定是否中止；
/// 单个文件的元数据读取失败只记录日志并跳过。
pub fn candidates<'a>(
    dir: &Path,
    options: &'a ScanOptions,
) -> impl Iterator<Item = Result<Candidate, IndexingError>> + 'a {
    let mut walker = WalkDir::new(dir)
        .follow_links(options.follow_symlinks)
        .sort_by_file_name();
    if options.max_depth > 0 {
        walker = walker.max_depth(options.max_depth);
    }

    walker
        .into_iter()
        .filter_entry(move |entry| !(options.skip_hidden && is_hidden(entry)))
        .filter_map(move |entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => return Some(Err(IndexingError::from(e))),
            };
            if !entry.file_type().is_file() || !options.accepts(entry.path()) {
                return None;
            }
            match entry.metadata().map_err(std::io::Error::from).and_then(|m| m.modified()) {
                Ok(modified) => Some(Ok(Candidate {
                    path: entry.into_path(),
                    modified,
                })),
                Err(e) => {
                    warn!("无法读取文件时间 {}: {}", entry.path().display(), e);
                    None
                }
            }
        })
}

/// 待提交的记录
struct Batch {
    entries: Vec<IndexEntry>,
    capacity: usize,
}

impl Batch {
    fn new(capacity: usize) -> Self {
        Self { entries: Vec::with_capacity(capacity), capacity }
    }

    /// 加入一条记录，返回是否已满
    fn push(&mut self, entry: IndexEntry) -> bool {
        self.entries.push(entry);
        self.entries.len() >= self.capacity
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn flush<S: RecordStore + ?Sized>(&mut self, store: &S) -> Result<(), EngineError> {
        store.commit_batch(&self.entries)?;
        debug!("批量提交 {} 条记录", self.entries.len());
        self.entries.clear();
        Ok(())
    }
}

/// 单次扫描统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub candidates: usize,
    pub skipped: usize,
    pub indexed: usize,
    pub read_failed: usize,
    pub parse_failed: usize,
    pub batches: usize,
}

impl ScanStats {
    /// 实际打开读取的文件数
    pub fn reads(&self) -> usize {
        self.indexed + self.read_failed + self.parse_failed
    }
}

/// 扫描一个目录
///
/// 成功完成后把本次扫描的开始时间写为新水位线；
/// 任何传播出来的错误或取消都不会改动水位线，下一次扫描从原位置重试。
pub fn scan_dir<S: RecordStore + ?Sized>(
    dir: &Path,
    store: &S,
    watermarks: &WatermarkStore,
    parser: &ParameterParser,
    options: &ScanOptions,
    cancel: &CancelToken,
) -> Result<ScanStats, IndexingError> {
    let dir = dir.canonicalize().map_err(|source| IndexingError::Traversal {
        path: dir.to_path_buf(),
        source,
    })?;
    let started_at = SystemTime::now();

    let watermark = if options.force_full {
        None
    } else {
        watermarks.get(&dir).map_err(IndexingError::Watermark)?
    };
    info!("开始扫描 {} (full: {})", dir.display(), watermark.is_none());

    let mut stats = ScanStats::default();
    let mut batch = Batch::new(options.batch_size.max(1));

    for candidate in candidates(&dir, options) {
        if cancel.is_cancelled() {
            info!("扫描已取消，丢弃 {} 条未提交记录", batch.len());
            return Err(IndexingError::Cancelled);
        }
        let candidate = candidate?;
        stats.candidates += 1;

        if freshness(candidate.modified, watermark) == Freshness::Fresh {
            stats.skipped += 1;
            continue;
        }

        match parse_image_file(&candidate.path, parser) {
            Ok(record) => {
                debug!("已解析 {}", candidate.path.display());
                stats.indexed += 1;
                let key = candidate.path.to_string_lossy().into_owned();
                if batch.push(IndexEntry::new(key, record)) {
                    batch.flush(store)?;
                    stats.batches += 1;
                }
            }
            Err(e) if e.is_parse_error() => {
                warn!("跳过 {}: {}", candidate.path.display(), e);
                stats.parse_failed += 1;
            }
            Err(e) => {
                warn!("跳过 {}: {}", candidate.path.display(), e);
                stats.read_failed += 1;
            }
        }
    }

    if cancel.is_cancelled() {
        info!("扫描已取消，丢弃 {} 条未提交记录", batch.len());
        return Err(IndexingError::Cancelled);
    }
    if !batch.is_empty() {
        batch.flush(store)?;
        stats.batches += 1;
    }

    watermarks.set(&dir, started_at).map_err(IndexingError::Watermark)?;
    info!(
        "扫描完成 {}: {} 个文件, 跳过 {}, 索引 {}, 读取失败 {}, 解析失败 {}",
        dir.display(),
        stats.candidates,
        stats.skipped,
        stats.indexed,
        stats.read_failed,
        stats.parse_failed,
    );
    Ok(stats)
}
