// src/lib.rs
pub mod config;
pub mod metadata;
pub mod schema;
pub mod engine;
pub mod api;
pub mod query;
pub mod state;
pub mod cancel;
pub mod indexer;
pub mod prune;
pub mod worker;
pub mod search;

pub use config::AppConfig;
pub use engine::{ImageIndex, ImageIndexBuilder, RecordStore};
pub use indexer::{scan_dir, IndexingError, ScanOptions, ScanStats};
pub use metadata::{parse_image_file, MetadataError, ParameterParser};
pub use prune::prune_index;
pub use schema::MetadataRecord;
