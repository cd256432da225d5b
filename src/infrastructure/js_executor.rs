//! JS 执行器 - 基础设施层
//!
//! 借用会话的页面，只暴露"执行 JS / 读取 DOM"的能力

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tokio::time::Instant;

use crate::browser::BrowserPage;
use crate::error::{ScrapeError, ScrapeResult};

/// JS 执行器
///
/// 职责：
/// - 借用 Session 的页面
/// - 暴露 eval() / content() 能力
/// - 不认识 Seed / Record
/// - 任何页面调用失败都归为 `ScrapeError::Browser`
pub struct JsExecutor<'a> {
    page: &'a dyn BrowserPage,
}

impl<'a> JsExecutor<'a> {
    /// 创建新的 JS 执行器
    pub fn new(page: &'a dyn BrowserPage) -> Self {
        Self { page }
    }

    /// 导航到 URL
    pub async fn goto(&self, url: &str) -> ScrapeResult<()> {
        self.page
            .navigate(url)
            .await
            .map_err(|e| ScrapeError::browser("navigate", e))
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: &str) -> ScrapeResult<JsonValue> {
        self.page
            .evaluate(js_code)
            .await
            .map_err(|e| ScrapeError::browser("evaluate", e))
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: &str) -> ScrapeResult<T> {
        let json_value = self.eval(js_code).await?;
        serde_json::from_value(json_value)
            .map_err(|e| ScrapeError::browser("evaluate", anyhow::Error::new(e)))
    }

    /// 当前渲染后的 HTML
    pub async fn content(&self) -> ScrapeResult<String> {
        self.page
            .content()
            .await
            .map_err(|e| ScrapeError::browser("content", e))
    }

    /// 反复执行 `probe` 直到返回 `Some`，超时返回 `NavigationTimeout`
    ///
    /// 第一次探测立即执行，之后每隔 `poll_interval` 一次
    pub async fn wait_until<T, F, Fut>(
        &self,
        step: &str,
        timeout: Duration,
        poll_interval: Duration,
        mut probe: F,
    ) -> ScrapeResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ScrapeResult<Option<T>>>,
    {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ScrapeError::timeout(step, timeout));
            }

            match tokio::time::timeout(remaining, probe()).await {
                Ok(Ok(Some(value))) => return Ok(value),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => return Err(e),
                Err(_) => return Err(ScrapeError::timeout(step, timeout)),
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            tokio::time::sleep(poll_interval.min(remaining)).await;
        }
    }
}
