//! 种子处理流程 - 流程层
//!
//! 核心职责：定义"一个种子"的完整处理流程
//!
//! 流程顺序：
//! 1. 打开列表页（Navigator）
//! 2. 提取当前页（Extractor）→ upsert → flush
//! 3. 翻页，回到 2；没有下一页时结束
//!
//! 每个 Navigator 步骤之后检查停止信号；已提取的记录总会先刷盘。

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::browser::Session;
use crate::config::Config;
use crate::error::{ScrapeError, ScrapeResult};
use crate::infrastructure::JsExecutor;
use crate::models::{PageState, Seed, SeedProgress};
use crate::retry::RetryPolicy;
use crate::services::{
    extract, flush_with_retry, ExtractCtx, Navigator, SharedWriter, UpsertOutcome,
};
use crate::utils::format_date;
use crate::utils::logging::truncate_text;
use crate::workflow::seed_ctx::SeedCtx;

/// 种子处理流程
///
/// - 编排 navigate → extract → upsert → paginate
/// - 会话由调用方租用和归还，流程只借用
/// - 页面能力调用失败时把会话标记为崩溃
pub struct SeedFlow {
    navigator: Navigator,
    writer: SharedWriter,
    writer_policy: RetryPolicy,
    verbose_logging: bool,
}

impl SeedFlow {
    /// 创建新的种子处理流程
    pub fn new(config: &Config, writer: SharedWriter) -> Self {
        Self {
            navigator: Navigator::new(config.navigator_settings()),
            writer,
            writer_policy: config.writer_retry_policy(),
            verbose_logging: config.verbose_logging,
        }
    }

    /// 处理一个种子
    ///
    /// 本次尝试的统计记入 `progress`，失败的尝试中已写入的记录同样计入
    pub async fn run(
        &self,
        session: &mut Session,
        seed: &Seed,
        ctx: &SeedCtx,
        progress: &mut SeedProgress,
        cancel: &CancellationToken,
    ) -> ScrapeResult<()> {
        let result = self.drive(session, seed, ctx, progress, cancel).await;

        if let Err(e) = &result {
            if e.is_crash() {
                warn!("{} 💥 浏览器会话 #{} 异常: {}", ctx, session.id(), e);
                session.mark_crashed();
            }
        }
        result
    }

    async fn drive(
        &self,
        session: &mut Session,
        seed: &Seed,
        ctx: &SeedCtx,
        progress: &mut SeedProgress,
        cancel: &CancellationToken,
    ) -> ScrapeResult<()> {
        info!("{} 🌐 打开 {}", ctx, seed.url);
        let mut state = self.navigator.goto_listing(session, seed).await?;

        while state.is_extractable() {
            let page = state.page().unwrap_or(1);
            self.process_page(session, seed, ctx, page, progress).await?;

            if cancel.is_cancelled() {
                warn!("{} ⏹ 收到停止信号，已保存第 {} 页", ctx, page);
                return Err(ScrapeError::Cancelled);
            }

            state = self.navigator.paginate(session, seed, state).await?;

            if cancel.is_cancelled() && state.is_extractable() {
                // 翻页已完成，先把这一页保存下来再停止
                let page = state.page().unwrap_or(page + 1);
                self.process_page(session, seed, ctx, page, progress).await?;
                warn!("{} ⏹ 收到停止信号，已保存第 {} 页", ctx, page);
                return Err(ScrapeError::Cancelled);
            }
        }

        match state {
            PageState::Done => {
                let stats = progress.stats();
                info!(
                    "{} ✅ 完成: {} 页，新增 {} 条，更新 {} 条，未变 {} 条",
                    ctx,
                    stats.pages,
                    stats.records_inserted,
                    stats.records_replaced,
                    stats.records_unchanged
                );
                Ok(())
            }
            PageState::Failed { reason } => Err(ScrapeError::malformed(&seed.url, reason)),
            other => Err(ScrapeError::malformed(
                &seed.url,
                format!("导航停在意外状态 {}", other),
            )),
        }
    }

    /// 提取当前页并写入
    async fn process_page(
        &self,
        session: &Session,
        seed: &Seed,
        ctx: &SeedCtx,
        page: u32,
        progress: &mut SeedProgress,
    ) -> ScrapeResult<()> {
        let html = JsExecutor::new(session.page()).content().await?;

        let extract_ctx = ExtractCtx::new(seed, &seed.url);
        let extraction = extract(&html, &extract_ctx)?;

        if let Some(partial) = extraction.partial_warning(&seed.url) {
            warn!("{} ⚠️ 第 {} 页 {}", ctx, page, partial);
        }
        if extraction.out_of_range > 0 {
            debug!(
                "{} 第 {} 页有 {} 行超出日期范围",
                ctx, page, extraction.out_of_range
            );
        }

        let found = extraction.records.len();
        {
            let mut writer = self.writer.lock().await;
            for record in extraction.records {
                if self.verbose_logging {
                    let date = record.event_date.map(format_date).unwrap_or_default();
                    debug!(
                        "{} 记录 {} {} ({})",
                        ctx,
                        record.key,
                        date,
                        truncate_text(&record.source_url, 60)
                    );
                }
                let key = record.key.clone();
                match writer.upsert(record) {
                    UpsertOutcome::Inserted => progress.inserted(key),
                    UpsertOutcome::Replaced => progress.replaced(key),
                    UpsertOutcome::Unchanged => progress.unchanged(&key),
                }
            }
        }
        flush_with_retry(&self.writer, &self.writer_policy).await?;

        progress.page_done(extraction.skipped, extraction.out_of_range);

        info!("{} 📑 第 {} 页: {} 条记录", ctx, page, found);
        Ok(())
    }
}
