use std::sync::Arc;

use morningstar_et::browser::{find_chrome, ChromiumDriver, ChromiumOptions, SessionManager};
use morningstar_et::config::Config;
use morningstar_et::logger;
use morningstar_et::services::{extract, ExtractCtx, Navigator};
use morningstar_et::Seed;

#[tokio::test]
#[ignore] // 默认忽略，需要本机 Chrome 和网络：cargo test -- --ignored
async fn test_scrape_single_listing() {
    // 初始化日志
    logger::init(true);

    // 加载配置
    let config = Config::from_env();
    assert!(
        config.chrome_executable.is_some() || find_chrome().is_some(),
        "未找到 Chrome，请设置 CHROME_EXECUTABLE"
    );

    // 启动浏览器
    let driver = Arc::new(ChromiumDriver::new(ChromiumOptions::from_config(&config)));
    let manager = SessionManager::new(driver, config.session_settings());
    let mut session = manager.acquire().await.expect("启动浏览器失败");
    assert!(manager.health_check(&mut session).await);

    // 打开列表页
    let seed = Seed::from_ticker("AAPL", &config.listing_url_template);
    let navigator = Navigator::new(config.navigator_settings());
    let state = navigator
        .goto_listing(&mut session, &seed)
        .await
        .expect("打开列表页失败");
    println!("页面状态: {}", state);

    // 提取当前页
    let html = session.page().content().await.expect("读取页面失败");
    let ctx = ExtractCtx::new(&seed, &seed.url);
    let extraction = extract(&html, &ctx).expect("提取失败");
    println!(
        "提取 {} 条记录，跳过 {} 行",
        extraction.records.len(),
        extraction.skipped
    );
    for record in &extraction.records {
        println!("{} {:?} {:?}", record.key, record.estimate, record.actual);
    }

    manager.release(session).await;
    manager.shutdown().await;
}

#[tokio::test]
#[ignore]
async fn test_browser_launch_and_teardown() {
    let config = Config::from_env();
    let driver = Arc::new(ChromiumDriver::new(ChromiumOptions::from_config(&config)));
    let manager = SessionManager::new(driver, config.session_settings());

    let session = manager.acquire().await.expect("启动浏览器失败");
    assert!(!session.endpoint().is_empty());
    manager.release(session).await;
    assert_eq!(manager.idle_count().await, 1);

    manager.shutdown().await;
    assert_eq!(manager.idle_count().await, 0);
}
