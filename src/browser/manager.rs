//! 浏览器会话管理器
//!
//! 唯一的浏览器进程所有者：启动、健康检查、崩溃后重启、销毁。
//! 同一时刻被租出的会话数不超过 `max_sessions`，每个会话只属于一个种子。

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

use super::{BrowserDriver, Session};
use crate::error::{ScrapeError, ScrapeResult};

/// 连续健康检查失败多少次后销毁会话
pub const MAX_HEALTH_FAILURES: u32 = 3;

/// 会话管理配置
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// 同时租出的会话上限
    pub max_sessions: usize,
    /// 单次启动超时
    pub launch_timeout: Duration,
    /// 每轮启动的尝试次数
    pub launch_retries: u32,
    /// 健康检查超时
    pub health_check_timeout: Duration,
    /// 单个会话最多处理的页面请求数，达到后回收
    pub max_requests_per_session: u32,
    /// 本次运行允许的重启次数
    pub max_relaunches: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_sessions: 2,
            launch_timeout: Duration::from_secs(30),
            launch_retries: 3,
            health_check_timeout: Duration::from_secs(5),
            max_requests_per_session: 50,
            max_relaunches: 5,
        }
    }
}

/// 会话被销毁的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Teardown {
    Crashed,
    Unhealthy,
    Recycled,
    Shutdown,
}

impl Teardown {
    /// 是否计入重启预算
    fn counts_as_relaunch(self) -> bool {
        matches!(self, Teardown::Crashed | Teardown::Unhealthy)
    }
}

impl fmt::Display for Teardown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Teardown::Crashed => "崩溃",
            Teardown::Unhealthy => "健康检查连续失败",
            Teardown::Recycled => "达到请求上限",
            Teardown::Shutdown => "运行结束",
        };
        f.write_str(label)
    }
}

/// 浏览器会话管理器
pub struct SessionManager {
    driver: Arc<dyn BrowserDriver>,
    settings: SessionSettings,
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<Session>>,
    next_id: AtomicU64,
    relaunches: AtomicU32,
    leased: AtomicUsize,
    closed: AtomicBool,
}

impl SessionManager {
    pub fn new(driver: Arc<dyn BrowserDriver>, settings: SessionSettings) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_sessions.max(1)));
        Self {
            driver,
            settings,
            permits,
            idle: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            relaunches: AtomicU32::new(0),
            leased: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// 本次运行已消耗的重启次数
    pub fn relaunches(&self) -> u32 {
        self.relaunches.load(Ordering::SeqCst)
    }

    /// 当前被租出的会话数
    pub fn leased(&self) -> usize {
        self.leased.load(Ordering::SeqCst)
    }

    /// 当前空闲的会话数
    pub async fn idle_count(&self) -> usize {
        self.idle.lock().await.len()
    }

    /// 租用一个会话
    ///
    /// 优先复用空闲会话；没有可用会话时启动新进程。
    /// 重启预算耗尽时返回 `BrowserUnavailable`。
    pub async fn acquire(&self) -> ScrapeResult<Session> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ScrapeError::Cancelled);
        }

        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ScrapeError::Cancelled)?;

        self.ensure_budget()?;

        let mut session = match self.reuse_idle().await {
            Some(session) => session,
            None => self.launch().await?,
        };

        session.attach_permit(permit);
        self.leased.fetch_add(1, Ordering::SeqCst);
        debug!("租出会话 #{} ({})", session.id(), session.endpoint());
        Ok(session)
    }

    /// 归还会话
    ///
    /// 崩溃的会话直接销毁；其余先做健康检查，健康的回到空闲池
    pub async fn release(&self, mut session: Session) {
        self.leased.fetch_sub(1, Ordering::SeqCst);
        let permit = session.take_permit();

        if self.closed.load(Ordering::SeqCst) {
            self.teardown(session, Teardown::Shutdown).await;
        } else if !session.is_healthy() {
            self.teardown(session, Teardown::Crashed).await;
        } else if !self.health_check(&mut session).await
            && session.consecutive_health_failures() >= MAX_HEALTH_FAILURES
        {
            self.teardown(session, Teardown::Unhealthy).await;
        } else {
            debug!("会话 #{} 回到空闲池", session.id());
            self.idle.lock().await.push(session);
        }

        // 进程处理完毕后再让出名额
        drop(permit);
    }

    /// 健康检查：在限定时间内执行一段最简单的脚本
    pub async fn health_check(&self, session: &mut Session) -> bool {
        let probe = tokio::time::timeout(
            self.settings.health_check_timeout,
            session.page().evaluate("1 + 1"),
        )
        .await;

        let ok = match probe {
            Ok(Ok(value)) => value.as_i64() == Some(2),
            Ok(Err(e)) => {
                warn!("会话 #{} 健康检查失败: {}", session.id(), e);
                false
            }
            Err(_) => {
                warn!(
                    "会话 #{} 健康检查超时 ({}ms)",
                    session.id(),
                    self.settings.health_check_timeout.as_millis()
                );
                false
            }
        };

        session.record_health(ok);
        ok
    }

    /// 关闭所有空闲会话并拒绝新的租用
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.permits.close();

        let sessions: Vec<Session> = self.idle.lock().await.drain(..).collect();
        info!("🧹 关闭 {} 个浏览器会话", sessions.len());
        for session in sessions {
            self.teardown(session, Teardown::Shutdown).await;
        }

        let leased = self.leased();
        if leased > 0 {
            warn!("⚠️ 仍有 {} 个会话未归还，将在归还时销毁", leased);
        }
    }

    fn ensure_budget(&self) -> ScrapeResult<()> {
        let relaunches = self.relaunches();
        if relaunches > self.settings.max_relaunches {
            return Err(ScrapeError::BrowserUnavailable {
                relaunches,
                budget: self.settings.max_relaunches,
            });
        }
        Ok(())
    }

    /// 从空闲池取一个可用会话，顺带回收达到上限或不健康的会话
    async fn reuse_idle(&self) -> Option<Session> {
        loop {
            let mut session = self.idle.lock().await.pop()?;

            if session.request_count() >= self.settings.max_requests_per_session {
                self.teardown(session, Teardown::Recycled).await;
                continue;
            }

            if self.revive(&mut session).await {
                return Some(session);
            }
            self.teardown(session, Teardown::Unhealthy).await;
        }
    }

    /// 对之前检查失败过的会话复查，直到通过或连续失败达到上限
    async fn revive(&self, session: &mut Session) -> bool {
        while session.consecutive_health_failures() > 0 {
            if self.health_check(session).await {
                return true;
            }
            if session.consecutive_health_failures() >= MAX_HEALTH_FAILURES {
                return false;
            }
        }
        true
    }

    /// 启动新会话，失败按 `launch_retries` 重试
    async fn launch(&self) -> ScrapeResult<Session> {
        let attempts = self.settings.launch_retries.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match tokio::time::timeout(self.settings.launch_timeout, self.driver.launch()).await {
                Ok(Ok(page)) => {
                    let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                    let session = Session::new(id, page);
                    info!("🌐 会话 #{} 已启动 ({})", id, session.endpoint());
                    return Ok(session);
                }
                Ok(Err(e)) => {
                    warn!("浏览器启动失败 (第 {}/{} 次): {}", attempt, attempts, e);
                    last_error = e.to_string();
                }
                Err(_) => {
                    warn!(
                        "浏览器启动超时 (第 {}/{} 次, {}s)",
                        attempt,
                        attempts,
                        self.settings.launch_timeout.as_secs()
                    );
                    last_error = format!(
                        "启动超过 {}s 未完成",
                        self.settings.launch_timeout.as_secs()
                    );
                }
            }
        }

        // 一整轮启动失败也消耗重启预算
        self.relaunches.fetch_add(1, Ordering::SeqCst);
        self.ensure_budget()?;

        Err(ScrapeError::SessionUnavailable {
            attempts,
            reason: last_error,
        })
    }

    async fn teardown(&self, session: Session, reason: Teardown) {
        let id = session.id();
        let age = (Utc::now() - session.created_at()).num_seconds();
        if reason.counts_as_relaunch() {
            let used = self.relaunches.fetch_add(1, Ordering::SeqCst) + 1;
            warn!(
                "♻️ 销毁会话 #{} ({}，存活 {}s，{} 次请求)，重启次数 {}/{}",
                id,
                reason,
                age,
                session.request_count(),
                used,
                self.settings.max_relaunches
            );
        } else {
            debug!(
                "销毁会话 #{} ({}，存活 {}s，{} 次请求)",
                id,
                reason,
                age,
                session.request_count()
            );
        }

        let (page, _permit) = session.into_parts();
        if let Err(e) = page.close().await {
            warn!("关闭会话 #{} 失败: {}", id, e);
        }
    }
}
