// engine/mod.rs - 索引引擎抽象层
//! 提供记录存取接口和基于 tantivy 的实现

pub mod core;
pub mod builder;

#[cfg(test)]
pub(crate) mod memory;

pub use core::*;
pub use builder::*;
