// main.rs
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sd_image_search::cancel::CancelToken;
use sd_image_search::config::{AppConfig, CONFIG_FILE};
use sd_image_search::engine::ImageIndexBuilder;
use sd_image_search::query::QueryParser;
use sd_image_search::search;
use sd_image_search::state::WatermarkStore;
use sd_image_search::worker::{spawn_indexer, WorkerOptions};

#[derive(Parser)]
#[command(name = "sd-image-search")]
#[command(version, about = "Index and search Stable Diffusion generation parameters in PNG / WebP images")]
struct Cli {
    /// 监控的图片目录（覆盖配置文件）
    dir: Option<PathBuf>,

    /// 配置文件路径
    #[arg(long, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// 索引目录
    #[arg(long)]
    index: Option<PathBuf>,

    /// 水位线数据库目录
    #[arg(long)]
    state: Option<PathBuf>,

    /// 忽略水位线，重新索引全部文件
    #[arg(long)]
    force: bool,

    /// 启动时清理已删除文件的索引条目
    #[arg(long)]
    prune: bool,

    /// 扫描间隔（秒）
    #[arg(long)]
    interval: Option<u64>,

    /// 不进入交互检索，只运行后台索引
    #[arg(long)]
    headless: bool,

    /// 写出默认配置文件后退出
    #[arg(long)]
    init_config: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // 日志输出到 stderr，stdout 留给交互检索
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    if cli.init_config {
        if cli.config.exists() {
            anyhow::bail!("配置文件已存在: {}", cli.config.display());
        }
        AppConfig::generate_default_config(&cli.config)
            .with_context(|| format!("无法写入配置文件 {}", cli.config.display()))?;
        info!("已生成默认配置: {}", cli.config.display());
        return Ok(());
    }

    let mut config = AppConfig::load_or_default(&cli.config);
    if let Some(dir) = cli.dir {
        config.paths.watch_path = dir;
    }
    if let Some(index) = cli.index {
        config.paths.index_path = index;
    }
    if let Some(state) = cli.state {
        config.paths.state_path = state;
    }
    if let Some(interval) = cli.interval {
        config.indexer.scan_interval_secs = interval;
    }

    if !config.paths.watch_path.exists() {
        std::fs::create_dir_all(&config.paths.watch_path)
            .with_context(|| format!("无法创建监控目录 {}", config.paths.watch_path.display()))?;
    }

    let index = Arc::new(ImageIndexBuilder::from_config(&config).build()?);
    let watermarks = Arc::new(WatermarkStore::open(&config.paths.state_path)?);

    let mut options = WorkerOptions::from_config(&config);
    options.scan.force_full = cli.force;
    // 新建的索引没有任何记录，水位线不可信
    if index.is_created() {
        options.reset_for_new_index(&watermarks)?;
    }
    options.prune_on_start = cli.prune;
    options.interval = Duration::from_secs(config.indexer.scan_interval_secs.max(1));

    info!("正在监控: {}", config.paths.watch_path.display());
    let cancel = CancelToken::new();
    let worker = spawn_indexer(options, index.clone(), watermarks, cancel.clone());

    if cli.headless {
        // 后台线程只有在取消后才退出
        let _ = worker.join();
        return Ok(());
    }

    println!("--- SD 图片检索 ---");
    println!("输入 prompt 关键词检索，可附加 --checkpoint= --size= --after= --before= --order= --page= --limit=");
    println!("输入 'checkpoints' 列出模型，'quit' 退出");

    let parser = QueryParser::new().with_default_limit(config.search.default_limit);
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        stdout.flush()?;

        let Some(line) = lines.next() else { break };
        let line = line?;
        let input = line.trim();

        if input == "quit" || input == "exit" {
            break;
        }
        if input.is_empty() {
            continue;
        }
        let result = if input == "checkpoints" {
            index
                .checkpoints()
                .map_err(anyhow::Error::from)
                .and_then(|names| search::print_checkpoints(&names, &mut stdout))
        } else {
            search::run_query(&index, &parser, input, &mut stdout)
        };
        if let Err(e) = result {
            println!("搜索出错: {:#}", e);
        }
    }

    cancel.cancel();
    if worker.join().is_err() {
        tracing::error!("后台索引线程异常退出");
    }
    Ok(())
}
