//! 浏览器能力层
//!
//! 核心逻辑只依赖 navigate / evaluate / read-DOM 这组能力，
//! 不依赖具体的自动化库；`ChromiumDriver` 是基于 chromiumoxide 的实现

pub mod headless;
pub mod manager;
pub mod session;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value as JsonValue;

pub use headless::{find_chrome, ChromiumDriver, ChromiumOptions};
pub use manager::{SessionManager, SessionSettings};
pub use session::Session;

/// 启动浏览器进程的能力
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// 启动一个浏览器进程并打开一个页面
    async fn launch(&self) -> Result<Box<dyn BrowserPage>>;
}

/// 单个浏览器页面暴露的能力
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// 导航到 URL（等待主文档加载）
    async fn navigate(&self, url: &str) -> Result<()>;

    /// 在页面中执行 JS 表达式并返回 JSON 结果
    async fn evaluate(&self, script: &str) -> Result<JsonValue>;

    /// 当前渲染后的完整 HTML
    async fn content(&self) -> Result<String>;

    /// 进程标识（如 DevTools websocket 地址）
    fn endpoint(&self) -> String;

    /// 关闭页面并结束浏览器进程
    async fn close(self: Box<Self>) -> Result<()>;
}
