// api/mod.rs - API 模块
//! 提供结构化的请求和响应类型

pub mod request;
pub mod response;

pub use request::*;
pub use response::*;
