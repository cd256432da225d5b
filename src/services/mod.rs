//! 业务能力层（Services）
//!
//! 每个能力只做一件事：
//! - `Navigator`：把浏览器带到可提取的页面状态、翻页
//! - `extractor`：渲染后的 HTML → `Record`（纯函数）
//! - `OutputWriter`：按键 upsert 并持久化

pub mod extractor;
pub mod navigator;
pub mod output_writer;

pub use extractor::{extract, Column, ExtractCtx, Extraction, RenderedTable, RowOutcome};
pub use navigator::{LoadState, Navigator, NavigatorSettings, Probe};
pub use output_writer::{
    flush_with_retry, safe_file_stem, OutputWriter, SharedWriter, UpsertOutcome,
};
