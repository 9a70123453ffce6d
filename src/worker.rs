// worker.rs - 后台索引线程
// 启动时可选清理一次，然后立即扫描，之后按固定间隔重复扫描，直到被取消
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info};

use crate::cancel::CancelToken;
use crate::config::AppConfig;
use crate::engine::RecordStore;
use crate::indexer::{scan_dir, IndexingError, ScanOptions};
use crate::metadata::ParameterParser;
use crate::prune::prune_index;
use crate::state::WatermarkStore;

/// 后台线程参数
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub watch_path: PathBuf,
    /// 只作用于第一次扫描
    pub scan: ScanOptions,
    pub prune_on_start: bool,
    pub prune_page_size: usize,
    pub interval: Duration,
}

impl WorkerOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            watch_path: config.paths.watch_path.clone(),
            scan: ScanOptions::from(config),
            prune_on_start: false,
            prune_page_size: config.indexer.prune_page_size,
            interval: Duration::from_secs(config.indexer.scan_interval_secs),
        }
    }

    /// 索引为新建时调用：清除旧水位线，第一次扫描改为全量
    ///
    /// 水位线被清除后，即使进程在第一次扫描成功前退出，下次启动仍会全量扫描。
    pub fn reset_for_new_index(&mut self, watermarks: &WatermarkStore) -> Result<()> {
        let dir = self
            .watch_path
            .canonicalize()
            .with_context(|| format!("无法访问监控目录 {}", self.watch_path.display()))?;
        watermarks.clear(&dir)?;
        self.scan.force_full = true;
        info!("索引为新建，已清除 {} 的水位线", dir.display());
        Ok(())
    }
}

/// 启动后台索引线程
///
/// 强制全量扫描会一直保持，直到有一次扫描成功。
pub fn spawn_indexer<S>(
    options: WorkerOptions,
    index: Arc<S>,
    watermarks: Arc<WatermarkStore>,
    cancel: CancelToken,
) -> JoinHandle<()>
where
    S: RecordStore + Send + Sync + 'static,
{
    thread::spawn(move || run(options, index.as_ref(), &watermarks, &cancel))
}

fn run<S: RecordStore>(options: WorkerOptions, index: &S, watermarks: &WatermarkStore, cancel: &CancelToken) {
    let parser = ParameterParser::new();

    if options.prune_on_start {
        match prune_index(index, options.prune_page_size, cancel) {
            Ok(_) => {}
            Err(IndexingError::Cancelled) => return,
            Err(e) => error!("清理索引失败: {}", e),
        }
    }

    let mut scan_options = options.scan.clone();
    loop {
        match scan_dir(&options.watch_path, index, watermarks, &parser, &scan_options, cancel) {
            Ok(_) => scan_options.force_full = false,
            Err(IndexingError::Cancelled) => break,
            Err(e) => error!("扫描 {} 失败: {}", options.watch_path.display(), e),
        }

        if cancel.wait_timeout(options.interval) {
            break;
        }
    }
    info!("后台索引线程退出");
}
