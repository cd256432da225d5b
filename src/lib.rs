//! # Morningstar ET
//!
//! 用无头浏览器爬取 Morningstar 财报日历（Earnings Calendar）的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `browser/` - 浏览器进程的唯一所有者，只暴露 navigate / evaluate / read-DOM 能力
//! - `SessionManager` - 启动、健康检查、崩溃重启、销毁
//! - `JsExecutor` - 借用会话页面，提供 eval() / wait_until() 能力
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `Navigator` - 页面状态机：打开列表页、等待加载、翻页
//! - `extractor` - HTML → Record，按表头识别列
//! - `OutputWriter` - 按键 upsert，临时文件 + rename 持久化
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个种子"的完整处理流程
//! - `SeedCtx` - 上下文封装（种子索引 + 尝试次数）
//! - `SeedFlow` - 流程编排（navigate → extract → upsert → paginate）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/run_controller` - 运行控制器，管理资源、并发和汇总
//! - `orchestrator/seed_processor` - 单个种子处理器，按错误分类重试
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;
pub mod retry;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::{BrowserDriver, BrowserPage, Session, SessionManager};
pub use config::Config;
pub use error::{ErrorClass, ScrapeError, ScrapeResult};
pub use infrastructure::JsExecutor;
pub use models::{PageState, Record, RecordKey, RunSummary, Seed};
pub use orchestrator::{process_seed, App};
pub use retry::RetryPolicy;
pub use workflow::{SeedCtx, SeedFlow};
