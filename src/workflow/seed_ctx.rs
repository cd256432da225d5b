//! 种子处理上下文
//!
//! 封装"我正在处理第几个种子的第几次尝试"这一信息

use std::fmt::Display;

/// 种子处理上下文
#[derive(Debug, Clone)]
pub struct SeedCtx {
    /// 种子ID（ticker 或 URL）
    pub seed_id: String,

    /// 种子索引（从1开始，仅用于日志显示）
    pub seed_index: usize,

    /// 当前是第几次尝试（从1开始）
    pub attempt: u32,
}

impl SeedCtx {
    /// 创建新的种子上下文
    pub fn new(seed_id: impl Into<String>, seed_index: usize) -> Self {
        Self {
            seed_id: seed_id.into(),
            seed_index,
            attempt: 1,
        }
    }

    /// 进入下一次尝试
    pub fn next_attempt(&mut self) {
        self.attempt += 1;
    }
}

impl Display for SeedCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[种子 {} {}", self.seed_index, self.seed_id)?;
        if self.attempt > 1 {
            write!(f, " 第{}次", self.attempt)?;
        }
        write!(f, "]")
    }
}
