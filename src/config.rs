// 配置模块 - 支持外部配置文件
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// 配置文件路径
pub const CONFIG_FILE: &str = "./config.toml";

// ============== 配置结构体 ==============

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub walker: WalkerConfig,
    pub indexer: IndexerConfig,
    pub search: SearchConfig,
    pub performance: PerformanceConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PathsConfig {
    /// 监控的图片目录
    pub watch_path: PathBuf,
    /// tantivy 索引目录
    pub index_path: PathBuf,
    /// 水位线数据库目录
    pub state_path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WalkerConfig {
    /// 是否跟随符号链接
    pub follow_symlinks: bool,
    /// 最大遍历深度 (0 表示无限制)
    pub max_depth: usize,
    /// 是否跳过隐藏文件
    pub skip_hidden: bool,
    /// 支持的文件扩展名
    pub supported_extensions: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IndexerConfig {
    pub batch_size: usize,
    pub prune_page_size: usize,
    pub scan_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    pub default_limit: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PerformanceConfig {
    pub index_writer_memory: usize,
}

// ============== 默认配置 ==============

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            watch_path: PathBuf::from("./images"),
            index_path: PathBuf::from("./storage"),
            state_path: PathBuf::from("./state"),
        }
    }
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            max_depth: 0,
            skip_hidden: true,
            supported_extensions: vec!["png".to_string(), "webp".to_string()],
        }
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            prune_page_size: 100,
            scan_interval_secs: 3600,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { default_limit: 20 }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self { index_writer_memory: 50_000_000 }
    }
}

// ============== 配置加载 ==============

impl AppConfig {
    /// 从指定文件加载，失败则使用默认配置
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load_from_file(path) {
            Ok(config) => {
                info!("配置已加载: {}", path.display());
                config
            }
            Err(e) => {
                warn!("无法加载配置文件 '{}': {:#}，使用默认配置", path.display(), e);
                Self::default()
            }
        }
    }

    /// 从指定文件加载配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("读取 {} 失败", path.display()))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("解析 {} 失败", path.display()))?;
        Ok(config)
    }

    /// 生成默认配置文件
    pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let default_content = include_str!("../config.toml");
        fs::write(path, default_content)?;
        Ok(())
    }
}
