//! 导航能力
//!
//! 驱动浏览器从列表页 URL 走到可提取状态，并负责翻页。
//! 每一步都等待具体的加载信号（表格行 / 空状态 / 404），而不是固定 sleep。

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use super::extractor::{
    COMPANY_SELECTOR, EMPTY_STATE_SELECTOR, NEXT_PAGE_SELECTOR, OVERLAY_CLOSE_SELECTORS,
    TABLE_ROW_SELECTOR,
};
use crate::browser::Session;
use crate::error::{ScrapeError, ScrapeResult};
use crate::infrastructure::JsExecutor;
use crate::models::{NavEvent, PageState, Seed};

/// 导航配置
#[derive(Debug, Clone)]
pub struct NavigatorSettings {
    /// 单步等待上限
    pub step_timeout: Duration,
    /// 轮询加载信号的间隔
    pub poll_interval: Duration,
    /// 单个种子最多翻页数
    pub max_pages: u32,
}

impl Default for NavigatorSettings {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(20),
            poll_interval: Duration::from_millis(250),
            max_pages: 50,
        }
    }
}

/// 页面加载探针返回的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    Loading,
    Table,
    Empty,
    NotFound,
}

/// 页面加载探针结果
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Probe {
    pub state: LoadState,
    /// 是否为单公司详情页
    #[serde(default)]
    pub detail: bool,
    /// 表格内容签名，翻页后用来判断内容是否已更新
    #[serde(default)]
    pub signature: String,
}

/// 页面脚本
///
/// 每段脚本开头的注释标明用途
pub mod scripts {
    use super::*;

    pub const PROBE_TAG: &str = "/* nav:probe */";
    pub const DISMISS_TAG: &str = "/* nav:dismiss */";
    pub const NEXT_TAG: &str = "/* nav:next */";

    fn js_str(s: &str) -> String {
        serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
    }

    /// 探测当前页面的加载状态
    pub fn probe() -> String {
        format!(
            r#"{tag}
            (() => {{
                const q = (s) => {{ try {{ return document.querySelector(s); }} catch (e) {{ return null; }} }};
                const detail = !!q({company});
                if (document.readyState === 'loading') {{
                    return {{ state: 'loading', detail, signature: '' }};
                }}
                const title = (document.title || '').toLowerCase();
                const text = ((document.body && document.body.innerText) || '').toLowerCase();
                if (title.includes('404') || title.includes('page not found')
                    || text.includes('page not found') || text.includes("we can't find")) {{
                    return {{ state: 'not_found', detail, signature: '' }};
                }}
                const rows = Array.from(document.querySelectorAll({rows}))
                    .filter(r => (r.innerText || '').trim().length > 0);
                if (rows.length > 0) {{
                    const first = rows[0].innerText.trim();
                    const last = rows[rows.length - 1].innerText.trim();
                    return {{ state: 'table', detail, signature: rows.length + ':' + first + '|' + last }};
                }}
                if (q({empty})) {{
                    return {{ state: 'empty', detail, signature: 'empty' }};
                }}
                return {{ state: 'loading', detail, signature: '' }};
            }})()"#,
            tag = PROBE_TAG,
            company = js_str(COMPANY_SELECTOR),
            rows = js_str(TABLE_ROW_SELECTOR),
            empty = js_str(EMPTY_STATE_SELECTOR),
        )
    }

    /// 关闭 cookie / 注册弹窗，返回点击的数量
    pub fn dismiss_overlays() -> String {
        let selectors = serde_json::to_string(OVERLAY_CLOSE_SELECTORS)
            .unwrap_or_else(|_| "[]".to_string());
        format!(
            r#"{tag}
            (() => {{
                let clicked = 0;
                for (const sel of {selectors}) {{
                    try {{
                        const el = document.querySelector(sel);
                        if (el && el.offsetParent !== null) {{ el.click(); clicked += 1; }}
                    }} catch (e) {{}}
                }}
                return clicked;
            }})()"#,
            tag = DISMISS_TAG,
        )
    }

    /// 点击可用的"下一页"控件，没有则返回 false
    pub fn click_next() -> String {
        format!(
            r#"{tag}
            (() => {{
                const next = Array.from(document.querySelectorAll({next})).find(el =>
                    !el.disabled
                    && el.getAttribute('aria-disabled') !== 'true'
                    && !String(el.className).includes('disabled'));
                if (!next) return false;
                next.scrollIntoView({{ block: 'center' }});
                next.click();
                return true;
            }})()"#,
            tag = NEXT_TAG,
            next = js_str(NEXT_PAGE_SELECTOR),
        )
    }
}

/// 导航器
///
/// - 只负责状态转换和等待
/// - 不解析表格（交给 Extractor）
/// - 单个种子内的步骤严格顺序执行
pub struct Navigator {
    settings: NavigatorSettings,
}

impl Navigator {
    pub fn new(settings: NavigatorSettings) -> Self {
        Self { settings }
    }

    /// 打开种子的列表页并等待内容加载
    ///
    /// 返回 `Detail` 或 `Paginating`；页面不存在时返回 `SeedNotFound`
    pub async fn goto_listing(&self, session: &mut Session, seed: &Seed) -> ScrapeResult<PageState> {
        session.record_request();
        let executor = JsExecutor::new(session.page());

        let state = PageState::Idle.transition(NavEvent::Navigate);
        debug!("[{}] {} → {}", seed.id, PageState::Idle, state);

        let goto = tokio::time::timeout(self.settings.step_timeout, executor.goto(&seed.url)).await;
        match goto {
            Ok(result) => result?,
            Err(_) => {
                let failed = state.transition(NavEvent::Fail("导航超时".to_string()));
                warn!("[{}] {}", seed.id, failed);
                return Err(ScrapeError::timeout("navigate", self.settings.step_timeout));
            }
        }

        self.dismiss_overlays(&executor).await?;

        let probe = self.wait_for_content(&executor, "listing", None).await?;
        self.settle(state, probe, seed)
    }

    /// 翻到下一页
    ///
    /// 没有下一页、详情页或达到翻页上限时返回 `Done`
    pub async fn paginate(
        &self,
        session: &mut Session,
        seed: &Seed,
        state: PageState,
    ) -> ScrapeResult<PageState> {
        let page = match state {
            PageState::Detail { .. } => return Ok(state.transition(NavEvent::NoNextPage)),
            PageState::Paginating { page } => page,
            other => {
                return Ok(other.transition(NavEvent::Fail("当前状态不能翻页".to_string())));
            }
        };

        if page >= self.settings.max_pages {
            warn!(
                "[{}] ⚠️ 已达到翻页上限 {}，停止翻页",
                seed.id, self.settings.max_pages
            );
            return Ok(state.transition(NavEvent::NoNextPage));
        }

        session.record_request();
        let executor = JsExecutor::new(session.page());

        let before: Probe = executor.eval_as(&scripts::probe()).await?;
        let clicked: bool = executor.eval_as(&scripts::click_next()).await?;
        if !clicked {
            debug!("[{}] 没有下一页", seed.id);
            return Ok(state.transition(NavEvent::NoNextPage));
        }

        let listing = state.transition(NavEvent::NextPage);
        info!("[{}] 📄 翻到第 {} 页", seed.id, page + 1);

        let probe = self
            .wait_for_content(&executor, "paginate", Some(&before.signature))
            .await?;
        self.settle(listing, probe, seed)
    }

    /// 根据探针结果完成 `Listing` 之后的转换
    fn settle(&self, state: PageState, probe: Probe, seed: &Seed) -> ScrapeResult<PageState> {
        if probe.state == LoadState::NotFound {
            let failed = state.transition(NavEvent::Fail("页面不存在".to_string()));
            debug!("[{}] {}", seed.id, failed);
            return Err(ScrapeError::SeedNotFound {
                seed: seed.id.clone(),
                url: seed.url.clone(),
            });
        }

        let next = state.transition(NavEvent::ContentLoaded {
            detail: probe.detail,
        });
        debug!("[{}] → {} ({:?})", seed.id, next, probe.state);
        Ok(next)
    }

    async fn dismiss_overlays(&self, executor: &JsExecutor<'_>) -> ScrapeResult<()> {
        let clicked = executor.eval(&scripts::dismiss_overlays()).await?;
        if clicked.as_u64().unwrap_or(0) > 0 {
            debug!("关闭了 {} 个弹窗", clicked);
        }
        Ok(())
    }

    /// 等待页面离开 loading；翻页时还要求表格签名发生变化
    async fn wait_for_content(
        &self,
        executor: &JsExecutor<'_>,
        step: &str,
        previous: Option<&str>,
    ) -> ScrapeResult<Probe> {
        let script = scripts::probe();
        let script = script.as_str();

        executor
            .wait_until(
                step,
                self.settings.step_timeout,
                self.settings.poll_interval,
                move || async move {
                    let probe: Probe = executor.eval_as(script).await?;
                    let ready = match probe.state {
                        LoadState::Loading => false,
                        LoadState::Table => previous.map_or(true, |sig| probe.signature != sig),
                        LoadState::Empty | LoadState::NotFound => true,
                    };
                    Ok(ready.then_some(probe))
                },
            )
            .await
    }
}
