//! 单个种子处理器 - 编排层
//!
//! ## 职责
//!
//! 租用会话、运行 `SeedFlow`、归还会话，并按错误分类决定：
//! - 可重试：按 `RetryPolicy` 退避后重试
//! - 持久性失败：记入汇总，跳过
//! - 致命：交给 Run Controller 中止剩余运行
//! - 取消：记为跳过

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::browser::SessionManager;
use crate::error::{ErrorClass, ScrapeError};
use crate::models::{Seed, SeedOutcome, SeedProgress, SeedStatus};
use crate::retry::RetryPolicy;
use crate::workflow::{SeedCtx, SeedFlow};

/// 种子处理结果，致命错误单独带出
#[derive(Debug)]
pub struct Processed {
    pub outcome: SeedOutcome,
    pub fatal: Option<ScrapeError>,
}

/// 处理单个种子
///
/// # 参数
/// - `manager`: 会话管理器
/// - `flow`: 种子流程
/// - `seed`: 种子
/// - `seed_index`: 种子索引（用于日志）
/// - `policy`: 重试策略
/// - `abort`: 停止信号 / 致命中止
pub async fn process_seed(
    manager: &SessionManager,
    flow: &SeedFlow,
    seed: &Seed,
    seed_index: usize,
    policy: &RetryPolicy,
    abort: &CancellationToken,
) -> Processed {
    let mut ctx = SeedCtx::new(&seed.id, seed_index);
    let mut progress = SeedProgress::default();

    loop {
        if abort.is_cancelled() {
            return finish(&ctx, &progress, skipped("运行已中止"), None);
        }

        let result = match manager.acquire().await {
            Ok(mut session) => {
                progress.begin_attempt();
                let result = flow.run(&mut session, seed, &ctx, &mut progress, abort).await;
                manager.release(session).await;
                result
            }
            Err(e) => Err(e),
        };

        let e = match result {
            Ok(()) => return finish(&ctx, &progress, SeedStatus::Succeeded, None),
            Err(e) => e,
        };

        match e.class() {
            ErrorClass::Cancelled => {
                info!("{} ⏹ 已停止", ctx);
                return finish(&ctx, &progress, skipped("运行已中止"), None);
            }
            ErrorClass::Fatal => {
                error!("{} ❌ 致命错误: {}", ctx, e);
                let status = failed(e.to_string());
                return finish(&ctx, &progress, status, Some(e));
            }
            ErrorClass::Persistent => {
                warn!("{} ❌ 失败（不重试）: {}", ctx, e);
                return finish(&ctx, &progress, failed(e.to_string()), None);
            }
            ErrorClass::Retryable if policy.should_retry(ctx.attempt) => {
                let delay = policy.backoff(ctx.attempt);
                warn!(
                    "{} 🔄 第 {}/{} 次失败，{}ms 后重试: {}",
                    ctx,
                    ctx.attempt,
                    policy.max_attempts,
                    delay.as_millis(),
                    e
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = abort.cancelled() => {}
                }
                ctx.next_attempt();
            }
            ErrorClass::Retryable => {
                error!("{} ❌ 重试 {} 次后仍失败: {}", ctx, ctx.attempt, e);
                let reason = format!("{} 次尝试后仍失败: {}", ctx.attempt, e);
                return finish(&ctx, &progress, failed(reason), None);
            }
        }
    }
}

fn failed(reason: impl Into<String>) -> SeedStatus {
    SeedStatus::Failed {
        reason: reason.into(),
    }
}

fn skipped(reason: impl Into<String>) -> SeedStatus {
    SeedStatus::Skipped {
        reason: reason.into(),
    }
}

fn finish(
    ctx: &SeedCtx,
    progress: &SeedProgress,
    status: SeedStatus,
    fatal: Option<ScrapeError>,
) -> Processed {
    Processed {
        outcome: SeedOutcome {
            seed_id: ctx.seed_id.clone(),
            status,
            attempts: ctx.attempt,
            stats: progress.stats(),
        },
        fatal,
    }
}
