use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::browser::SessionSettings;
use crate::retry::RetryPolicy;
use crate::services::NavigatorSettings;

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 种子输入目录
    pub input_dir: String,
    /// 输出目录
    pub output_dir: String,
    /// 运行日志文件
    pub output_log_file: String,
    /// 只给了 ticker 的种子使用的列表页模板（`{ticker}` 会被替换）
    pub listing_url_template: String,
    /// 同时存活的浏览器会话数量
    pub max_concurrent_sessions: usize,
    // --- 浏览器配置 ---
    pub chrome_executable: Option<String>,
    pub headless: bool,
    pub user_agent: String,
    pub launch_timeout_secs: u64,
    pub launch_retries: u32,
    pub health_check_timeout_ms: u64,
    pub max_requests_per_session: u32,
    pub max_relaunches: u32,
    // --- 导航配置 ---
    pub step_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub max_pages: u32,
    // --- 重试配置 ---
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub writer_max_retries: u32,
    /// 同一 worker 相邻两个种子之间的随机间隔
    pub seed_delay_min_ms: u64,
    pub seed_delay_max_ms: u64,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: "input".to_string(),
            output_dir: "output/morningstar_ET".to_string(),
            output_log_file: "output/morningstar_ET.log".to_string(),
            listing_url_template: "https://www.morningstar.com/stocks/xnas/{ticker}/earnings"
                .to_string(),
            max_concurrent_sessions: 2,
            chrome_executable: None,
            headless: true,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            launch_timeout_secs: 30,
            launch_retries: 3,
            health_check_timeout_ms: 5_000,
            max_requests_per_session: 50,
            max_relaunches: 5,
            step_timeout_secs: 20,
            poll_interval_ms: 250,
            max_pages: 50,
            max_attempts: 3,
            backoff_base_ms: 2_000,
            backoff_max_ms: 30_000,
            writer_max_retries: 3,
            seed_delay_min_ms: 3_000,
            seed_delay_max_ms: 5_000,
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            input_dir: std::env::var("INPUT_DIR").unwrap_or(default.input_dir),
            output_dir: std::env::var("OUTPUT_DIR").unwrap_or(default.output_dir),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            listing_url_template: std::env::var("LISTING_URL_TEMPLATE").unwrap_or(default.listing_url_template),
            max_concurrent_sessions: env_or("MAX_CONCURRENT_SESSIONS", default.max_concurrent_sessions).max(1),
            chrome_executable: std::env::var("CHROME_EXECUTABLE").ok().filter(|v| !v.trim().is_empty()),
            headless: env_or("HEADLESS", default.headless),
            user_agent: std::env::var("USER_AGENT").unwrap_or(default.user_agent),
            launch_timeout_secs: env_or("LAUNCH_TIMEOUT_SECS", default.launch_timeout_secs),
            launch_retries: env_or("LAUNCH_RETRIES", default.launch_retries).max(1),
            health_check_timeout_ms: env_or("HEALTH_CHECK_TIMEOUT_MS", default.health_check_timeout_ms),
            max_requests_per_session: env_or("MAX_REQUESTS_PER_SESSION", default.max_requests_per_session).max(1),
            max_relaunches: env_or("MAX_RELAUNCHES", default.max_relaunches),
            step_timeout_secs: env_or("STEP_TIMEOUT_SECS", default.step_timeout_secs),
            poll_interval_ms: env_or("POLL_INTERVAL_MS", default.poll_interval_ms),
            max_pages: env_or("MAX_PAGES", default.max_pages).max(1),
            max_attempts: env_or("MAX_ATTEMPTS", default.max_attempts).max(1),
            backoff_base_ms: env_or("BACKOFF_BASE_MS", default.backoff_base_ms),
            backoff_max_ms: env_or("BACKOFF_MAX_MS", default.backoff_max_ms),
            writer_max_retries: env_or("WRITER_MAX_RETRIES", default.writer_max_retries),
            seed_delay_min_ms: env_or("SEED_DELAY_MIN_MS", default.seed_delay_min_ms),
            seed_delay_max_ms: env_or("SEED_DELAY_MAX_MS", default.seed_delay_max_ms),
            verbose_logging: env_or("VERBOSE_LOGGING", default.verbose_logging),
        }
    }

    /// 会话管理器配置
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            max_sessions: self.max_concurrent_sessions,
            launch_timeout: Duration::from_secs(self.launch_timeout_secs),
            launch_retries: self.launch_retries,
            health_check_timeout: Duration::from_millis(self.health_check_timeout_ms),
            max_requests_per_session: self.max_requests_per_session,
            max_relaunches: self.max_relaunches,
        }
    }

    /// 导航器配置
    pub fn navigator_settings(&self) -> NavigatorSettings {
        NavigatorSettings {
            step_timeout: Duration::from_secs(self.step_timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_pages: self.max_pages,
        }
    }

    /// 种子级重试策略
    pub fn seed_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.backoff_base_ms),
            Duration::from_millis(self.backoff_max_ms),
        )
    }

    /// 写入重试策略（首次写入 + writer_max_retries 次重试）
    pub fn writer_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.writer_max_retries + 1,
            Duration::from_millis(self.backoff_base_ms / 4),
            Duration::from_millis(self.backoff_max_ms),
        )
    }

    /// 相邻种子之间的间隔范围
    pub fn seed_delay(&self) -> (Duration, Duration) {
        let min = self.seed_delay_min_ms.min(self.seed_delay_max_ms);
        let max = self.seed_delay_min_ms.max(self.seed_delay_max_ms);
        (Duration::from_millis(min), Duration::from_millis(max))
    }

    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(&self.output_dir)
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
