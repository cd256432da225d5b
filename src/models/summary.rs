use std::collections::HashSet;
use std::fmt::Display;

use chrono::{DateTime, Local};

use crate::models::record::RecordKey;

/// 单个种子的写入统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedStats {
    pub pages: u32,
    pub records_inserted: usize,
    pub records_replaced: usize,
    pub records_unchanged: usize,
    /// 关键字段无法解析而丢弃的行
    pub rows_skipped: usize,
    /// 超出种子日期范围的行
    pub rows_out_of_range: usize,
}

impl SeedStats {
    pub fn merge(&mut self, other: &SeedStats) {
        self.pages += other.pages;
        self.records_inserted += other.records_inserted;
        self.records_replaced += other.records_replaced;
        self.records_unchanged += other.records_unchanged;
        self.rows_skipped += other.rows_skipped;
        self.rows_out_of_range += other.rows_out_of_range;
    }
}

/// 一个种子跨多次尝试的进度
///
/// 新增/覆盖是真实写盘，跨尝试累加；页数、未变、丢弃行只取最近一次尝试，
/// 前面尝试已写入的键在重试中再次遇到时不计为未变
#[derive(Debug, Default, Clone)]
pub struct SeedProgress {
    committed: SeedStats,
    attempt: SeedStats,
    written: HashSet<RecordKey>,
}

impl SeedProgress {
    /// 开始新的一次尝试
    pub fn begin_attempt(&mut self) {
        self.committed.records_inserted += self.attempt.records_inserted;
        self.committed.records_replaced += self.attempt.records_replaced;
        self.attempt = SeedStats::default();
    }

    pub fn inserted(&mut self, key: RecordKey) {
        self.attempt.records_inserted += 1;
        self.written.insert(key);
    }

    pub fn replaced(&mut self, key: RecordKey) {
        self.attempt.records_replaced += 1;
        self.written.insert(key);
    }

    pub fn unchanged(&mut self, key: &RecordKey) {
        if !self.written.contains(key) {
            self.attempt.records_unchanged += 1;
        }
    }

    pub fn page_done(&mut self, rows_skipped: usize, rows_out_of_range: usize) {
        self.attempt.pages += 1;
        self.attempt.rows_skipped += rows_skipped;
        self.attempt.rows_out_of_range += rows_out_of_range;
    }

    pub fn stats(&self) -> SeedStats {
        SeedStats {
            records_inserted: self.committed.records_inserted + self.attempt.records_inserted,
            records_replaced: self.committed.records_replaced + self.attempt.records_replaced,
            ..self.attempt
        }
    }
}

/// 种子最终状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedStatus {
    Succeeded,
    Failed { reason: String },
    /// 未执行或被中止（致命错误 / 停止信号）
    Skipped { reason: String },
}

/// 单个种子的处理结果
#[derive(Debug, Clone)]
pub struct SeedOutcome {
    pub seed_id: String,
    pub status: SeedStatus,
    pub attempts: u32,
    pub stats: SeedStats,
}

impl SeedOutcome {
    pub fn skipped(seed_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            seed_id: seed_id.into(),
            status: SeedStatus::Skipped {
                reason: reason.into(),
            },
            attempts: 0,
            stats: SeedStats::default(),
        }
    }
}

/// 运行汇总，运行结束时输出一次
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub seeds_total: usize,
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub skipped: Vec<(String, String)>,
    /// 有行被丢弃的种子及丢弃行数
    pub partial: Vec<(String, usize)>,
    pub stats: SeedStats,
    pub retries: u32,
    pub relaunches: u32,
    pub fatal: Option<String>,
    /// 运行被停止信号打断
    pub interrupted: bool,
    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
}

impl RunSummary {
    pub fn new(seeds_total: usize) -> Self {
        Self {
            seeds_total,
            succeeded: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            partial: Vec::new(),
            stats: SeedStats::default(),
            retries: 0,
            relaunches: 0,
            fatal: None,
            interrupted: false,
            started_at: Local::now(),
            finished_at: None,
        }
    }

    /// 记入一个种子的结果
    pub fn record(&mut self, outcome: SeedOutcome) {
        self.retries += outcome.attempts.saturating_sub(1);
        self.stats.merge(&outcome.stats);
        if outcome.stats.rows_skipped > 0 {
            self.partial
                .push((outcome.seed_id.clone(), outcome.stats.rows_skipped));
        }
        match outcome.status {
            SeedStatus::Succeeded => self.succeeded.push(outcome.seed_id),
            SeedStatus::Failed { reason } => self.failed.push((outcome.seed_id, reason)),
            SeedStatus::Skipped { reason } => self.skipped.push((outcome.seed_id, reason)),
        }
    }

    /// 记录致命错误（只保留第一个）
    pub fn mark_fatal(&mut self, reason: impl Into<String>) {
        if self.fatal.is_none() {
            self.fatal = Some(reason.into());
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Local::now());
    }

    /// 已入汇总的种子数量
    pub fn seeds_reported(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.skipped.len()
    }

    pub fn records_written(&self) -> usize {
        self.stats.records_inserted + self.stats.records_replaced
    }

    /// 进程退出码：0 全部成功，1 致命中止，2 有失败的种子，3 被停止信号打断且有种子未完成
    pub fn exit_code(&self) -> u8 {
        if self.fatal.is_some() {
            1
        } else if !self.failed.is_empty() {
            2
        } else if self.interrupted && !self.skipped.is_empty() {
            3
        } else {
            0
        }
    }
}

impl Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "种子总数: {}", self.seeds_total)?;
        writeln!(f, "✅ 成功: {}/{}", self.succeeded.len(), self.seeds_total)?;
        writeln!(f, "❌ 失败: {}", self.failed.len())?;
        for (seed, reason) in &self.failed {
            writeln!(f, "   - {}: {}", seed, reason)?;
        }
        writeln!(f, "⏭️ 跳过: {}", self.skipped.len())?;
        for (seed, reason) in &self.skipped {
            writeln!(f, "   - {}: {}", seed, reason)?;
        }
        writeln!(
            f,
            "💾 记录: 新增 {}, 更新 {}, 未变 {}",
            self.stats.records_inserted, self.stats.records_replaced, self.stats.records_unchanged
        )?;
        writeln!(
            f,
            "⚠️ 丢弃行: {} (涉及 {} 个种子), 超出日期范围: {}",
            self.stats.rows_skipped,
            self.partial.len(),
            self.stats.rows_out_of_range
        )?;
        writeln!(f, "🔁 重试: {}, 浏览器重启: {}", self.retries, self.relaunches)?;
        if let Some(fatal) = &self.fatal {
            writeln!(f, "💥 致命中止: {}", fatal)?;
        }
        if self.interrupted {
            writeln!(f, "⏹ 运行被停止信号中断")?;
        }
        Ok(())
    }
}
