// query/mod.rs - 查询模块
//! 查询解析和构建

mod parser;
pub mod filter;

pub use parser::*;
pub use filter::*;
