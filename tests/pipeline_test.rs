//! 整条流水线的集成测试（脚本化浏览器，不需要 Chrome）

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::*;
use morningstar_et::browser::BrowserDriver;
use morningstar_et::models::SeedStatus;
use morningstar_et::{App, Config, RunSummary, Seed};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const TEMPLATE: &str = "https://www.morningstar.com/stocks/xnas/{ticker}/earnings";

fn seed(ticker: &str) -> Seed {
    Seed::from_ticker(ticker, TEMPLATE)
}

async fn run_once(
    config: &Config,
    driver: Arc<dyn BrowserDriver>,
    seeds: Vec<Seed>,
    cancel: CancellationToken,
) -> RunSummary {
    let app = App::with_driver(config.clone(), driver, cancel).unwrap();
    let summary = app.run_seeds(seeds).await;
    app.shutdown().await;
    summary
}

fn two_company_site() -> Arc<FakeSite> {
    let site = FakeSite::new();
    site.set(
        &listing_url("AAPL"),
        Listing::Pages(vec![
            calendar_html(
                "AAPL",
                &[
                    ("Q4 2024", "Jan 30, 2025", "$2.35", "$2.40"),
                    ("Q1 2025", "May 1, 2025", "$1.62", "—"),
                ],
            ),
            calendar_html("AAPL", &[("Q3 2024", "Oct 31, 2024", "1.60", "1.64")]),
        ]),
    );
    site.set(
        &listing_url("MSFT"),
        Listing::Pages(vec![calendar_html(
            "MSFT",
            &[("Q2 2025", "2025-01-29", "3.11", "3.23")],
        )]),
    );
    site
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let site = two_company_site();

    let first = run_once(
        &config,
        FakeDriver::new(site.clone()),
        vec![seed("AAPL"), seed("MSFT")],
        CancellationToken::new(),
    )
    .await;
    assert_eq!(first.exit_code(), 0);
    assert_eq!(first.succeeded.len(), 2);
    assert_eq!(first.stats.records_inserted, 4);
    assert_eq!(first.stats.pages, 3);

    let aapl_before = std::fs::read_to_string(dir.path().join("output/AAPL.json")).unwrap();

    let second = run_once(
        &config,
        FakeDriver::new(site.clone()),
        vec![seed("AAPL"), seed("MSFT")],
        CancellationToken::new(),
    )
    .await;
    assert_eq!(second.exit_code(), 0);
    assert_eq!(second.stats.records_inserted, 0);
    assert_eq!(second.stats.records_replaced, 0);
    assert_eq!(second.stats.records_unchanged, 4);

    let aapl_after = std::fs::read_to_string(dir.path().join("output/AAPL.json")).unwrap();
    assert_eq!(aapl_before, aapl_after);

    let records = read_output(dir.path(), "AAPL");
    let periods: Vec<&str> = records.iter().map(|r| r.key.period.as_str()).collect();
    assert_eq!(periods, vec!["2024_Q4", "2025_Q1", "2024_Q3"]);
}

#[tokio::test]
async fn test_actual_fills_in_and_is_never_cleared() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let site = FakeSite::new();
    let url = listing_url("NVDA");

    site.set(
        &url,
        Listing::Pages(vec![calendar_html("NVDA", &[("Q4 2025", "2025-02-26", "0.85", "")])]),
    );
    run_once(&config, FakeDriver::new(site.clone()), vec![seed("NVDA")], CancellationToken::new()).await;
    assert_eq!(read_output(dir.path(), "NVDA")[0].actual, None);

    site.set(
        &url,
        Listing::Pages(vec![calendar_html("NVDA", &[("Q4 2025", "2025-02-26", "0.85", "0.89")])]),
    );
    let summary =
        run_once(&config, FakeDriver::new(site.clone()), vec![seed("NVDA")], CancellationToken::new()).await;
    assert_eq!(summary.stats.records_replaced, 1);
    assert_eq!(read_output(dir.path(), "NVDA")[0].actual, Some(0.89));

    site.set(
        &url,
        Listing::Pages(vec![calendar_html("NVDA", &[("Q4 2025", "2025-02-26", "0.85", "-")])]),
    );
    let summary =
        run_once(&config, FakeDriver::new(site.clone()), vec![seed("NVDA")], CancellationToken::new()).await;
    assert_eq!(summary.stats.records_unchanged, 1);

    let records = read_output(dir.path(), "NVDA");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].actual, Some(0.89));
}

#[tokio::test]
async fn test_same_key_later_actual_wins() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let site = FakeSite::new();
    site.set(
        &listing_url("IBM"),
        Listing::Pages(vec![calendar_html(
            "IBM",
            &[
                ("Q3 2024", "2024-10-23", "2.20", "2.30"),
                ("Q3 2024", "2024-10-23", "2.20", "2.30 (restated 2.31)"),
                ("Q3 2024", "2024-10-23", "2.20", "2.31"),
            ],
        )]),
    );

    let summary =
        run_once(&config, FakeDriver::new(site), vec![seed("IBM")], CancellationToken::new()).await;
    assert_eq!(summary.exit_code(), 0);

    let records = read_output(dir.path(), "IBM");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].actual, Some(2.31));
}

#[tokio::test]
async fn test_missing_actual_column_yields_nulls_without_flags() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let site = FakeSite::new();
    site.set(
        &listing_url("TSLA"),
        Listing::Pages(vec![estimate_only_html(
            "TSLA",
            &[("2025-01-29", "0.77"), ("2025-04-22", "0.41")],
        )]),
    );

    let summary =
        run_once(&config, FakeDriver::new(site), vec![seed("TSLA")], CancellationToken::new()).await;
    assert_eq!(summary.exit_code(), 0);
    assert!(summary.partial.is_empty());

    let records = read_output(dir.path(), "TSLA");
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.actual.is_none() && !r.actual_parse_failed));
    assert_eq!(records[0].key.period, "2025_Q1");
    assert_eq!(records[1].key.period, "2025_Q2");
}

#[tokio::test]
async fn test_navigation_timeout_is_reported_as_failed() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let site = two_company_site();
    site.set(&listing_url("SLOW"), Listing::NeverLoads);

    let summary = run_once(
        &config,
        FakeDriver::new(site),
        vec![seed("SLOW"), seed("MSFT")],
        CancellationToken::new(),
    )
    .await;

    assert_eq!(summary.exit_code(), 2);
    assert_eq!(summary.succeeded, vec!["MSFT".to_string()]);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, "SLOW");
    assert!(summary.failed[0].1.contains("导航超时"));
    // 首次尝试 + 1 次重试
    assert_eq!(summary.retries, 1);
    assert_eq!(summary.seeds_reported(), summary.seeds_total);
}

#[tokio::test]
async fn test_unknown_seed_is_persistent_failure() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let site = two_company_site();

    let summary = run_once(
        &config,
        FakeDriver::new(site.clone()),
        vec![seed("NOPE")],
        CancellationToken::new(),
    )
    .await;

    assert_eq!(summary.exit_code(), 2);
    assert!(summary.failed[0].1.contains("种子未找到"));
    assert_eq!(summary.retries, 0);
    assert_eq!(site.navigations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_crash_mid_run_relaunches_and_retries() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        max_concurrent_sessions: 1,
        ..test_config(dir.path())
    };
    let site = two_company_site();
    site.crash_on_navigate(&listing_url("AAPL"), 1);
    let driver = FakeDriver::new(site.clone());

    let summary = run_once(
        &config,
        driver.clone(),
        vec![seed("AAPL"), seed("MSFT")],
        CancellationToken::new(),
    )
    .await;

    assert_eq!(summary.exit_code(), 0);
    assert_eq!(summary.succeeded.len(), 2);
    assert_eq!(summary.relaunches, 1);
    assert_eq!(summary.retries, 1);
    assert_eq!(driver.launches.load(Ordering::SeqCst), 2);
    // 崩溃的会话被销毁，剩下的在关闭时销毁：没有进程泄漏
    assert_eq!(driver.closes.load(Ordering::SeqCst), 2);
    assert_eq!(read_output(dir.path(), "AAPL").len(), 3);
}

#[tokio::test]
async fn test_retry_after_partial_progress_counts_pages_once() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        max_concurrent_sessions: 1,
        ..test_config(dir.path())
    };
    let site = two_company_site();
    // 第一页保存后翻页时崩溃，重试从头再来
    site.crash_on_next_page(&listing_url("AAPL"), 1);

    let summary = run_once(
        &config,
        FakeDriver::new(site),
        vec![seed("AAPL")],
        CancellationToken::new(),
    )
    .await;

    assert_eq!(summary.exit_code(), 0);
    assert_eq!(summary.retries, 1);
    assert_eq!(summary.stats.pages, 2);
    assert_eq!(summary.stats.records_inserted, 3);
    assert_eq!(summary.stats.records_unchanged, 0);
    assert_eq!(read_output(dir.path(), "AAPL").len(), 3);
}

#[tokio::test]
async fn test_browser_unavailable_aborts_remaining_seeds() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        max_concurrent_sessions: 1,
        max_relaunches: 0,
        ..test_config(dir.path())
    };
    let site = two_company_site();

    let summary = run_once(
        &config,
        FakeDriver::broken(site),
        vec![seed("AAPL"), seed("MSFT"), seed("IBM")],
        CancellationToken::new(),
    )
    .await;

    assert_eq!(summary.exit_code(), 1);
    assert!(summary.fatal.as_deref().unwrap().contains("浏览器不可用"));
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.skipped.len(), 2);
    assert_eq!(summary.seeds_reported(), 3);
}

#[tokio::test]
async fn test_stop_signal_before_start_skips_everything() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = run_once(
        &config,
        FakeDriver::new(two_company_site()),
        vec![seed("AAPL"), seed("MSFT")],
        cancel,
    )
    .await;

    assert_eq!(summary.skipped.len(), 2);
    assert!(summary.skipped.iter().all(|(_, r)| r.contains("停止信号")));
    assert_eq!(summary.records_written(), 0);
    assert!(summary.interrupted);
    assert_eq!(summary.exit_code(), 3);
}

#[tokio::test]
async fn test_stop_signal_mid_seed_flushes_current_page() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        max_concurrent_sessions: 1,
        ..test_config(dir.path())
    };
    let site = two_company_site();
    let cancel = CancellationToken::new();
    site.cancel_on_next_page(cancel.clone());

    let summary = run_once(
        &config,
        FakeDriver::new(site),
        vec![seed("AAPL"), seed("MSFT")],
        cancel,
    )
    .await;

    // 第二页在停止前完成加载，也被保存
    assert_eq!(read_output(dir.path(), "AAPL").len(), 3);
    assert!(!dir.path().join("output/MSFT.json").exists());

    assert!(summary.succeeded.is_empty());
    assert_eq!(summary.skipped.len(), 2);
    assert_eq!(summary.stats.records_inserted, 3);
    assert_eq!(summary.exit_code(), 3);
}

#[tokio::test]
async fn test_empty_calendar_succeeds_with_zero_records() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let site = FakeSite::new();
    site.set(&listing_url("NEWCO"), Listing::Empty);

    let summary =
        run_once(&config, FakeDriver::new(site), vec![seed("NEWCO")], CancellationToken::new()).await;

    assert_eq!(summary.exit_code(), 0);
    assert_eq!(summary.succeeded, vec!["NEWCO".to_string()]);
    assert_eq!(summary.records_written(), 0);
}

#[tokio::test]
async fn test_run_loads_seeds_and_appends_summary_to_log() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    std::fs::create_dir_all(dir.path().join("input")).unwrap();
    std::fs::write(
        dir.path().join("input/morningstar_ET_urls.csv"),
        format!("url,ticker\n{}\n", listing_url("MSFT")),
    )
    .unwrap();

    let app = App::with_driver(
        config.clone(),
        FakeDriver::new(two_company_site()),
        CancellationToken::new(),
    )
    .unwrap();
    let summary = app.run().await.unwrap();

    assert_eq!(summary.succeeded, vec!["MSFT".to_string()]);
    let log = std::fs::read_to_string(&config.output_log_file).unwrap();
    assert!(log.contains("种子总数: 1"));
}
