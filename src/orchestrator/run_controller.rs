//! 运行控制器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责一次运行的资源管理和调度。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：初始化日志文件、创建会话管理器、打开输出目录
//! 2. **批量加载**：扫描并加载所有种子（`Vec<Seed>`）
//! 3. **并发控制**：使用 Semaphore 限制同时处理的种子数
//! 4. **失败隔离**：单个种子失败不影响其他种子；致命错误中止剩余种子
//! 5. **资源管理**：持有 SessionManager 和输出写入器，运行结束时关闭所有浏览器
//! 6. **全局统计**：汇总为 `RunSummary`

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::browser::{BrowserDriver, ChromiumDriver, ChromiumOptions, SessionManager};
use crate::config::Config;
use crate::models::{load_all_seeds, RunSummary, Seed, SeedOutcome, SeedStats, SeedStatus};
use crate::orchestrator::seed_processor::{self, Processed};
use crate::services::{OutputWriter, SharedWriter};
use crate::utils::logging::{
    append_summary, init_log_file, log_seeds_loaded, log_startup, print_final_stats,
};
use crate::workflow::SeedFlow;

/// 应用主结构
pub struct App {
    config: Config,
    manager: Arc<SessionManager>,
    writer: SharedWriter,
    cancel: CancellationToken,
}

impl App {
    /// 初始化应用（使用本机 Chrome）
    pub async fn initialize(config: Config) -> Result<Self> {
        let driver = Arc::new(ChromiumDriver::new(ChromiumOptions::from_config(&config)));
        Self::with_driver(config, driver, CancellationToken::new())
    }

    /// 使用任意浏览器驱动初始化应用
    pub fn with_driver(
        config: Config,
        driver: Arc<dyn BrowserDriver>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        // 初始化日志文件
        init_log_file(&config.output_log_file)?;

        log_startup(config.max_concurrent_sessions);

        let writer = OutputWriter::open(config.output_path())?;
        let manager = SessionManager::new(driver, config.session_settings());

        Ok(Self {
            config,
            manager: Arc::new(manager),
            writer: Arc::new(Mutex::new(writer)),
            cancel,
        })
    }

    /// 停止信号，取消后在途种子保存当前页并退出
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<RunSummary> {
        // 加载所有种子
        info!("\n📁 正在扫描种子文件...");
        let seeds =
            load_all_seeds(&self.config.input_dir, &self.config.listing_url_template).await?;

        if seeds.is_empty() {
            warn!("⚠️ 没有找到待处理的种子，程序结束");
        } else {
            log_seeds_loaded(seeds.len(), self.config.max_concurrent_sessions);
        }

        let summary = self.run_seeds(seeds).await;
        self.shutdown().await;

        // 输出最终统计
        print_final_stats(&summary, &self.config.output_log_file);
        if let Err(e) = append_summary(&self.config.output_log_file, &summary) {
            warn!("写入运行日志失败: {}", e);
        }

        Ok(summary)
    }

    /// 关闭所有浏览器会话
    pub async fn shutdown(&self) {
        self.manager.shutdown().await;
    }

    /// 处理所有种子
    pub async fn run_seeds(&self, seeds: Vec<Seed>) -> RunSummary {
        let mut summary = RunSummary::new(seeds.len());
        let max_concurrent = self.config.max_concurrent_sessions.max(1);
        let semaphore = Arc::new(Semaphore::new(max_concurrent));
        let abort = self.cancel.child_token();

        let flow = Arc::new(SeedFlow::new(&self.config, self.writer.clone()));
        let policy = self.config.seed_retry_policy();
        let delay = self.config.seed_delay();

        let mut handles = Vec::new();
        let mut pending = seeds.into_iter().enumerate();

        // 为每个种子创建并发任务
        while let Some((idx, seed)) = pending.next() {
            let permit = tokio::select! {
                biased;
                _ = abort.cancelled() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                // 中止后尚未开始的种子全部记为跳过
                let reason = self.abort_reason();
                summary.record(SeedOutcome::skipped(seed.id, reason.clone()));
                for (_, seed) in pending.by_ref() {
                    summary.record(SeedOutcome::skipped(seed.id, reason.clone()));
                }
                break;
            };

            let seed_index = idx + 1;
            let seed_id = seed.id.clone();
            let manager = self.manager.clone();
            let flow = flow.clone();
            let abort = abort.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;

                // 同一并发槽位上相邻两个种子之间的礼貌间隔
                if idx >= max_concurrent {
                    politeness_delay(delay, &abort).await;
                }

                let processed = seed_processor::process_seed(
                    &manager, &flow, &seed, seed_index, &policy, &abort,
                )
                .await;
                if processed.fatal.is_some() {
                    abort.cancel();
                }
                processed
            });
            handles.push((seed_index, seed_id, handle));
        }

        // 等待所有任务完成
        for (seed_index, seed_id, handle) in handles {
            record_joined(&mut summary, seed_index, seed_id, handle.await);
        }

        if self.cancel.is_cancelled() {
            warn!("⏹ 运行被停止信号中断");
            summary.interrupted = true;
        }

        summary.relaunches = self.manager.relaunches();
        summary.finish();
        summary
    }

    fn abort_reason(&self) -> String {
        if self.cancel.is_cancelled() {
            "收到停止信号".to_string()
        } else {
            "致命错误中止运行".to_string()
        }
    }
}

/// 把一个种子任务的结果记入汇总；任务 panic 时按原种子 id 记为失败
fn record_joined(
    summary: &mut RunSummary,
    seed_index: usize,
    seed_id: String,
    joined: Result<Processed, JoinError>,
) {
    match joined {
        Ok(Processed { outcome, fatal }) => {
            if let Some(e) = fatal {
                summary.mark_fatal(e.to_string());
            }
            summary.record(outcome);
        }
        Err(e) => {
            error!("[种子 {} {}] 任务执行失败: {}", seed_index, seed_id, e);
            summary.record(SeedOutcome {
                seed_id,
                status: SeedStatus::Failed {
                    reason: format!("任务执行失败: {}", e),
                },
                attempts: 1,
                stats: SeedStats::default(),
            });
        }
    }
}

/// 随机等待 `min..=max`，收到停止信号时立即返回
async fn politeness_delay((min, max): (Duration, Duration), abort: &CancellationToken) {
    if max.is_zero() {
        return;
    }
    let millis = {
        let mut rng = rand::thread_rng();
        rng.gen_range(min.as_millis() as u64..=max.as_millis() as u64)
    };
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_millis(millis)) => {}
        _ = abort.cancelled() => {}
    }
}
