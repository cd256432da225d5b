use std::process::ExitCode;

use anyhow::Result;
use morningstar_et::{logger, App, Config};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // 加载配置
    let config = Config::from_env();

    // 初始化日志
    logger::init(config.verbose_logging);

    // 初始化并运行应用
    let app = App::initialize(config).await?;
    spawn_signal_listener(app.cancel_token());

    let summary = match app.run().await {
        Ok(summary) => summary,
        Err(e) => {
            app.shutdown().await;
            error!("❌ 运行失败: {:#}", e);
            return Err(e);
        }
    };

    Ok(ExitCode::from(summary.exit_code()))
}

/// Ctrl-C / SIGTERM 触发停止信号
fn spawn_signal_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        warn!("⏹ 收到停止信号，等待在途种子保存当前页...");
        cancel.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            warn!("无法监听 SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
