//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `run_controller` - 运行控制器
//! - 管理应用生命周期（初始化、运行、清理）
//! - 批量加载种子（Vec<Seed>）
//! - 控制并发数量（Semaphore）
//! - 持有 SessionManager 和输出写入器
//! - 致命错误 / 停止信号时中止剩余种子
//! - 输出全局统计（RunSummary）
//!
//! ### `seed_processor` - 单个种子处理器
//! - 租用 / 归还会话
//! - 按错误分类决定重试、跳过还是中止
//!
//! ## 层次关系
//!
//! ```text
//! run_controller (处理 Vec<Seed>)
//!     ↓
//! seed_processor (重试单个 Seed)
//!     ↓
//! workflow::SeedFlow (navigate → extract → upsert → paginate)
//!     ↓
//! services (能力层：navigator / extractor / output_writer)
//!     ↓
//! infrastructure + browser (JsExecutor / SessionManager)
//! ```

pub mod run_controller;
pub mod seed_processor;

// 重新导出主要类型
pub use run_controller::App;
pub use seed_processor::{process_seed, Processed};
