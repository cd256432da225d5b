use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde_json::Value as JsonValue;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{BrowserDriver, BrowserPage};
use crate::config::Config;

/// 无头浏览器启动参数
#[derive(Debug, Clone)]
pub struct ChromiumOptions {
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub user_agent: String,
}

impl ChromiumOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            executable: config
                .chrome_executable
                .as_ref()
                .map(PathBuf::from)
                .or_else(find_chrome),
            headless: config.headless,
            user_agent: config.user_agent.clone(),
        }
    }
}

/// 在 PATH 中查找 Chrome / Chromium
pub fn find_chrome() -> Option<PathBuf> {
    [
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
    ]
    .iter()
    .find_map(|name| which::which(name).ok())
}

/// 基于 chromiumoxide 的浏览器驱动
pub struct ChromiumDriver {
    options: ChromiumOptions,
}

impl ChromiumDriver {
    pub fn new(options: ChromiumOptions) -> Self {
        Self { options }
    }

    fn browser_config(&self) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder();
        builder = if self.options.headless {
            builder.new_headless_mode()
        } else {
            builder.with_head()
        };
        if let Some(path) = &self.options.executable {
            builder = builder.chrome_executable(path);
        }

        builder
            .args(vec![
                "--no-sandbox".to_string(),            // 容器内以 root 运行时必须
                "--disable-dev-shm-usage".to_string(), // 防止 /dev/shm 不足
                "--disable-gpu".to_string(),
                "--window-size=1920,1080".to_string(), // 保证表格按桌面布局渲染
                "--disable-blink-features=AutomationControlled".to_string(),
                format!("--user-agent={}", self.options.user_agent),
            ])
            .build()
            .map_err(|e| {
                error!("配置无头浏览器失败: {}", e);
                anyhow::anyhow!("配置无头浏览器失败: {}", e)
            })
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    /// 启动无头浏览器并打开空白页
    async fn launch(&self) -> Result<Box<dyn BrowserPage>> {
        info!("🚀 启动无头浏览器...");
        debug!("可执行文件: {:?}", self.options.executable);

        let config = self.browser_config()?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            error!("启动无头浏览器失败: {}", e);
            anyhow::anyhow!("启动无头浏览器失败: {}", e)
        })?;
        debug!("无头浏览器启动成功");

        // 在后台处理浏览器事件
        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("创建页面失败")?;

        let endpoint = browser.websocket_address().clone();
        info!("✅ 无头浏览器已就绪: {}", endpoint);

        Ok(Box::new(ChromiumPage {
            browser,
            page,
            handler_task,
            endpoint,
        }))
    }
}

/// 一个浏览器进程及其唯一页面
///
/// 进程被 drop 时由 chromiumoxide 负责结束
pub struct ChromiumPage {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    endpoint: String,
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn navigate(&self, url: &str) -> Result<()> {
        debug!("导航到: {}", url);
        self.page
            .goto(url)
            .await
            .with_context(|| format!("导航到 {} 失败", url))?;
        self.page
            .wait_for_navigation()
            .await
            .with_context(|| format!("等待 {} 加载失败", url))?;
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<JsonValue> {
        let result = self.page.evaluate(script).await.context("执行脚本失败")?;
        let value = result.into_value().context("无法转换脚本返回值")?;
        Ok(value)
    }

    async fn content(&self) -> Result<String> {
        self.page.content().await.context("获取页面内容失败")
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let ChromiumPage {
            mut browser,
            page,
            handler_task,
            endpoint,
        } = *self;

        debug!("关闭浏览器: {}", endpoint);
        drop(page);
        if let Err(e) = browser.close().await {
            warn!("关闭浏览器失败，强制结束进程: {}", e);
            let _ = browser.kill().await;
        }
        if let Err(e) = browser.wait().await {
            warn!("等待浏览器进程退出失败: {}", e);
        }
        handler_task.abort();
        Ok(())
    }
}
