use chrono::{DateTime, Utc};
use tokio::sync::OwnedSemaphorePermit;

use super::BrowserPage;

/// 一个存活的浏览器会话
///
/// 只能由 `SessionManager` 创建和销毁；被租出时独占一个并发名额
pub struct Session {
    id: u64,
    page: Box<dyn BrowserPage>,
    endpoint: String,
    created_at: DateTime<Utc>,
    request_count: u32,
    healthy: bool,
    consecutive_health_failures: u32,
    permit: Option<OwnedSemaphorePermit>,
}

impl Session {
    pub(crate) fn new(id: u64, page: Box<dyn BrowserPage>) -> Self {
        let endpoint = page.endpoint();
        Self {
            id,
            page,
            endpoint,
            created_at: Utc::now(),
            request_count: 0,
            healthy: true,
            consecutive_health_failures: 0,
            permit: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// 浏览器进程标识
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn request_count(&self) -> u32 {
        self.request_count
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    pub fn consecutive_health_failures(&self) -> u32 {
        self.consecutive_health_failures
    }

    /// 页面能力
    pub fn page(&self) -> &dyn BrowserPage {
        self.page.as_ref()
    }

    /// 记一次页面请求（导航 / 翻页）
    pub fn record_request(&mut self) {
        self.request_count += 1;
    }

    /// 标记为已崩溃，归还时直接销毁
    pub fn mark_crashed(&mut self) {
        self.healthy = false;
    }

    pub(crate) fn record_health(&mut self, ok: bool) {
        if ok {
            self.consecutive_health_failures = 0;
        } else {
            self.consecutive_health_failures += 1;
        }
    }

    pub(crate) fn attach_permit(&mut self, permit: OwnedSemaphorePermit) {
        self.permit = Some(permit);
    }

    pub(crate) fn take_permit(&mut self) -> Option<OwnedSemaphorePermit> {
        self.permit.take()
    }

    pub(crate) fn into_parts(self) -> (Box<dyn BrowserPage>, Option<OwnedSemaphorePermit>) {
        (self.page, self.permit)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("created_at", &self.created_at)
            .field("request_count", &self.request_count)
            .field("healthy", &self.healthy)
            .field("consecutive_health_failures", &self.consecutive_health_failures)
            .finish()
    }
}
