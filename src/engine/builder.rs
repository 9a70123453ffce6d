// engine/builder.rs - 索引构建器
//! 使用 Builder 模式打开或新建 ImageIndex

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use tantivy::{Index, ReloadPolicy, directory::MmapDirectory, schema::{Field, Schema}};
use tracing::info;

use crate::config::AppConfig;
use crate::schema;
use crate::schema::fields::*;

use super::core::{ImageIndex, EngineError, EngineResult};

/// 索引构建器
pub struct ImageIndexBuilder {
    storage_path: Option<PathBuf>,
    heap_size: usize,
}

impl Default for ImageIndexBuilder {
    fn default() -> Self {
        Self {
            storage_path: None,
            heap_size: 50_000_000, // 50MB
        }
    }
}

impl ImageIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从配置中读取存储路径和写入缓冲
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new()
            .with_storage_path(&config.paths.index_path)
            .with_heap_size(config.performance.index_writer_memory)
    }

    /// 设置存储路径
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    /// 设置 IndexWriter 堆大小
    pub fn with_heap_size(mut self, size: usize) -> Self {
        self.heap_size = size;
        self
    }

    /// 打开已有索引，不存在则新建
    pub fn build(self) -> EngineResult<ImageIndex> {
        let storage_path = self.storage_path
            .unwrap_or_else(|| PathBuf::from("storage/index"));

        std::fs::create_dir_all(&storage_path)?;

        let schema = schema::build_schema();

        let dir = MmapDirectory::open(&storage_path)
            .map_err(|e| EngineError::Directory(e.to_string()))?;
        let created = !Index::exists(&dir)
            .map_err(|e| EngineError::Directory(e.to_string()))?;
        let index = Index::open_or_create(dir, schema.clone())?;
        if created {
            info!("已新建索引: {}", storage_path.display());
        }

        let writer = index.writer(self.heap_size)?;
        let writer = Arc::new(RwLock::new(writer));

        // 每次提交后手动刷新
        let reader = index.reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(ImageIndex {
            field_path: field(&schema, FIELD_PATH)?,
            field_prompt: field(&schema, FIELD_PROMPT)?,
            field_negative_prompt: field(&schema, FIELD_NEGATIVE_PROMPT)?,
            field_checkpoint: field(&schema, FIELD_CHECKPOINT)?,
            field_pixel: field(&schema, FIELD_PIXEL)?,
            field_creation_time: field(&schema, FIELD_CREATION_TIME)?,
            field_metadata: field(&schema, FIELD_METADATA)?,
            field_record: field(&schema, FIELD_RECORD)?,
            index,
            writer,
            reader,
            created,
        })
    }
}

fn field(schema: &Schema, name: &str) -> EngineResult<Field> {
    schema.get_field(name)
        .map_err(|_| EngineError::Config(format!("Missing field: {name}")))
}
