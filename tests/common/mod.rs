//! 测试用的脚本化浏览器
//!
//! `FakeSite` 按 URL 描述页面行为，`FakeDriver` 启动的每个 `FakePage`
//! 都根据脚本标记返回探针结果、翻页结果和 HTML。

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use morningstar_et::browser::{BrowserDriver, BrowserPage};
use morningstar_et::services::navigator::scripts;
use morningstar_et::{Config, Record};
use serde_json::{json, Value as JsonValue};
use tokio_util::sync::CancellationToken;

/// 一个 URL 的页面行为
#[derive(Clone)]
pub enum Listing {
    /// 表格页，每个元素是一页 HTML
    Pages(Vec<String>),
    /// 空状态
    Empty,
    /// 404
    NotFound,
    /// 永远停在 loading
    NeverLoads,
}

#[derive(Default)]
pub struct FakeSite {
    listings: Mutex<HashMap<String, Listing>>,
    /// 导航到该 URL 时模拟崩溃的剩余次数
    crashes: Mutex<HashMap<String, u32>>,
    /// 在该 URL 点击下一页时模拟崩溃的剩余次数
    next_crashes: Mutex<HashMap<String, u32>>,
    /// 点击下一页时触发的停止信号
    cancel_on_next: Mutex<Option<CancellationToken>>,
    pub navigations: AtomicU32,
}

impl FakeSite {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, url: &str, listing: Listing) {
        self.listings.lock().unwrap().insert(url.to_string(), listing);
    }

    pub fn crash_on_navigate(&self, url: &str, times: u32) {
        self.crashes.lock().unwrap().insert(url.to_string(), times);
    }

    pub fn crash_on_next_page(&self, url: &str, times: u32) {
        self.next_crashes.lock().unwrap().insert(url.to_string(), times);
    }

    pub fn cancel_on_next_page(&self, token: CancellationToken) {
        *self.cancel_on_next.lock().unwrap() = Some(token);
    }

    fn listing(&self, url: &str) -> Listing {
        self.listings
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or(Listing::NotFound)
    }

    fn take_crash(&self, url: &str) -> bool {
        take_one(&mut self.crashes.lock().unwrap(), url)
    }

    fn take_next_crash(&self, url: &str) -> bool {
        take_one(&mut self.next_crashes.lock().unwrap(), url)
    }
}

fn take_one(counters: &mut HashMap<String, u32>, url: &str) -> bool {
    match counters.get_mut(url) {
        Some(n) if *n > 0 => {
            *n -= 1;
            true
        }
        _ => false,
    }
}

pub struct FakeDriver {
    site: Arc<FakeSite>,
    pub launches: AtomicU32,
    pub closes: Arc<AtomicU32>,
    fail_launches: bool,
}

impl FakeDriver {
    pub fn new(site: Arc<FakeSite>) -> Arc<Self> {
        Arc::new(Self {
            site,
            launches: AtomicU32::new(0),
            closes: Arc::new(AtomicU32::new(0)),
            fail_launches: false,
        })
    }

    /// 每次启动都失败的驱动
    pub fn broken(site: Arc<FakeSite>) -> Arc<Self> {
        Arc::new(Self {
            site,
            launches: AtomicU32::new(0),
            closes: Arc::new(AtomicU32::new(0)),
            fail_launches: true,
        })
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    async fn launch(&self) -> Result<Box<dyn BrowserPage>> {
        if self.fail_launches {
            return Err(anyhow!("no chrome binary"));
        }
        let id = self.launches.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Box::new(FakePage {
            id,
            site: self.site.clone(),
            closes: self.closes.clone(),
            current: Mutex::new((String::new(), 0)),
        }))
    }
}

pub struct FakePage {
    id: u32,
    site: Arc<FakeSite>,
    closes: Arc<AtomicU32>,
    /// (当前 URL, 当前页下标)
    current: Mutex<(String, usize)>,
}

impl FakePage {
    fn probe(&self) -> JsonValue {
        let (url, page) = self.current.lock().unwrap().clone();
        match self.site.listing(&url) {
            Listing::Pages(pages) => {
                let html = pages.get(page).cloned().unwrap_or_default();
                json!({
                    "state": "table",
                    "detail": html.contains("company-name"),
                    "signature": format!("{}#{}", url, page),
                })
            }
            Listing::Empty => json!({ "state": "empty", "detail": false, "signature": "empty" }),
            Listing::NotFound => json!({ "state": "not_found", "detail": false, "signature": "" }),
            Listing::NeverLoads => json!({ "state": "loading", "detail": false, "signature": "" }),
        }
    }

    fn click_next(&self) -> JsonValue {
        let mut current = self.current.lock().unwrap();
        let pages = match self.site.listing(&current.0) {
            Listing::Pages(pages) => pages.len(),
            _ => 0,
        };
        if current.1 + 1 < pages {
            current.1 += 1;
            if let Some(token) = self.site.cancel_on_next.lock().unwrap().as_ref() {
                token.cancel();
            }
            json!(true)
        } else {
            json!(false)
        }
    }
}

#[async_trait]
impl BrowserPage for FakePage {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.site.navigations.fetch_add(1, Ordering::SeqCst);
        if self.site.take_crash(url) {
            return Err(anyhow!("Target closed"));
        }
        *self.current.lock().unwrap() = (url.to_string(), 0);
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<JsonValue> {
        if script.starts_with(scripts::PROBE_TAG) {
            Ok(self.probe())
        } else if script.starts_with(scripts::DISMISS_TAG) {
            Ok(json!(0))
        } else if script.starts_with(scripts::NEXT_TAG) {
            let url = self.current.lock().unwrap().0.clone();
            if self.site.take_next_crash(&url) {
                return Err(anyhow!("Target closed"));
            }
            Ok(self.click_next())
        } else {
            // 健康检查
            Ok(json!(2))
        }
    }

    async fn content(&self) -> Result<String> {
        let (url, page) = self.current.lock().unwrap().clone();
        Ok(match self.site.listing(&url) {
            Listing::Pages(pages) => pages.get(page).cloned().unwrap_or_default(),
            Listing::Empty => r#"<div class="mds-empty-state">No earnings</div>"#.to_string(),
            _ => "<html></html>".to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("fake://browser/{}", self.id)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// 一行财报数据：(财季, 日期, 预估, 实际)
pub type Row<'a> = (&'a str, &'a str, &'a str, &'a str);

/// 生成一页财报日历 HTML
pub fn calendar_html(ticker: &str, rows: &[Row<'_>]) -> String {
    let body: String = rows
        .iter()
        .map(|(period, date, estimate, actual)| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                period, date, estimate, actual
            )
        })
        .collect();
    format!(
        r#"<html><body>
        <span class="ticker">{ticker}</span>
        <table>
          <thead><tr><th>Quarter</th><th>Report Date</th><th>EPS Estimate</th><th>Actual EPS</th></tr></thead>
          <tbody>{body}</tbody>
        </table>
        </body></html>"#
    )
}

/// 不含 actual 列的页面
pub fn estimate_only_html(ticker: &str, rows: &[(&str, &str)]) -> String {
    let body: String = rows
        .iter()
        .map(|(date, estimate)| format!("<tr><td>{}</td><td>{}</td></tr>", date, estimate))
        .collect();
    format!(
        r#"<span class="ticker">{ticker}</span>
        <table>
          <thead><tr><th>Date</th><th>Consensus Estimate</th></tr></thead>
          <tbody>{body}</tbody>
        </table>"#
    )
}

pub fn listing_url(ticker: &str) -> String {
    format!(
        "https://www.morningstar.com/stocks/xnas/{}/earnings",
        ticker.to_lowercase()
    )
}

/// 测试用配置：极短的超时和退避，无礼貌间隔
pub fn test_config(root: &Path) -> Config {
    Config {
        input_dir: root.join("input").to_string_lossy().to_string(),
        output_dir: root.join("output").to_string_lossy().to_string(),
        output_log_file: root.join("run.log").to_string_lossy().to_string(),
        max_concurrent_sessions: 2,
        launch_timeout_secs: 5,
        launch_retries: 2,
        health_check_timeout_ms: 500,
        max_relaunches: 3,
        step_timeout_secs: 1,
        poll_interval_ms: 10,
        max_attempts: 2,
        backoff_base_ms: 1,
        backoff_max_ms: 5,
        writer_max_retries: 1,
        seed_delay_min_ms: 0,
        seed_delay_max_ms: 0,
        ..Config::default()
    }
}

/// 读取某个 ticker 的输出文件
pub fn read_output(root: &Path, ticker: &str) -> Vec<Record> {
    let path = root.join("output").join(format!("{}.json", ticker));
    let content = std::fs::read_to_string(path).unwrap();
    serde_json::from_str(&content).unwrap()
}
