use std::path::PathBuf;

use thiserror::Error;

/// 错误分类
///
/// Run Controller 只根据分类决定重试、跳过还是中止整个运行
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// 可重试（按 RetryPolicy 退避后重试）
    Retryable,
    /// 持久性失败（记入汇总并跳过该种子）
    Persistent,
    /// 致命（中止剩余运行，非零退出）
    Fatal,
    /// 外部停止信号
    Cancelled,
}

/// 爬虫错误类型
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// 浏览器进程启动或响应失败
    #[error("浏览器会话不可用 (已尝试 {attempts} 次): {reason}")]
    SessionUnavailable { attempts: u32, reason: String },

    /// 页面状态未在时限内到达
    #[error("导航超时: 步骤 {step} 超过 {timeout_ms}ms")]
    NavigationTimeout { step: String, timeout_ms: u64 },

    /// 部分行无法解析（只记录，不重试）
    #[error("部分提取: {skipped} 行无法解析 ({url})")]
    ExtractionPartial { url: String, skipped: usize },

    /// 重启预算耗尽
    #[error("浏览器不可用: 本次运行已重启 {relaunches} 次，超出预算 {budget}")]
    BrowserUnavailable { relaunches: u32, budget: u32 },

    /// 输出持久化失败
    #[error("写入输出失败 ({path}): {source}")]
    WriterIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 种子对应页面不存在
    #[error("种子未找到: {seed} ({url})")]
    SeedNotFound { seed: String, url: String },

    /// 页面结构无法识别
    #[error("页面结构异常 ({url}): {reason}")]
    MalformedPage { url: String, reason: String },

    /// 浏览器能力层调用失败（视为会话崩溃）
    #[error("浏览器操作失败 ({operation}): {source}")]
    Browser {
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    /// 收到停止信号
    #[error("运行已取消")]
    Cancelled,
}

impl ScrapeError {
    /// 错误分类
    pub fn class(&self) -> ErrorClass {
        match self {
            ScrapeError::SessionUnavailable { .. }
            | ScrapeError::NavigationTimeout { .. }
            | ScrapeError::Browser { .. } => ErrorClass::Retryable,
            ScrapeError::ExtractionPartial { .. }
            | ScrapeError::SeedNotFound { .. }
            | ScrapeError::MalformedPage { .. } => ErrorClass::Persistent,
            ScrapeError::BrowserUnavailable { .. } | ScrapeError::WriterIo { .. } => {
                ErrorClass::Fatal
            }
            ScrapeError::Cancelled => ErrorClass::Cancelled,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }

    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::Fatal
    }

    /// 是否意味着浏览器会话已经崩溃
    pub fn is_crash(&self) -> bool {
        matches!(self, ScrapeError::Browser { .. })
    }

    // ========== 便捷构造函数 ==========

    /// 创建浏览器操作错误
    pub fn browser(operation: impl Into<String>, source: anyhow::Error) -> Self {
        ScrapeError::Browser {
            operation: operation.into(),
            source,
        }
    }

    /// 创建导航超时错误
    pub fn timeout(step: impl Into<String>, timeout: std::time::Duration) -> Self {
        ScrapeError::NavigationTimeout {
            step: step.into(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// 创建写入错误
    pub fn writer_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ScrapeError::WriterIo {
            path: path.into(),
            source,
        }
    }

    /// 创建页面结构错误
    pub fn malformed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        ScrapeError::MalformedPage {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// 爬虫结果类型
pub type ScrapeResult<T> = Result<T, ScrapeError>;
