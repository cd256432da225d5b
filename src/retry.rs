//! 重试策略
//!
//! 所有重试/退避都走这一个策略对象，调用方不再各自写重试循环

use std::time::Duration;

use rand::Rng;

/// 指数退避重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 最大尝试次数（含第一次）
    pub max_attempts: u32,
    /// 第一次重试前的等待
    pub base_delay: Duration,
    /// 单次等待上限
    pub max_delay: Duration,
    /// 是否叠加随机抖动（最多 base_delay 的一半）
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
            jitter: true,
        }
    }

    /// 关闭抖动（测试或需要确定性时使用）
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// 第 `attempt` 次尝试失败后是否还能再试（attempt 从 1 开始）
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// 第 `attempt` 次失败后的退避时间：base * 2^(attempt-1)，封顶 max_delay
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self
            .base_delay
            .checked_mul(1u32 << exp)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);

        if !self.jitter || self.base_delay.is_zero() {
            return delay;
        }

        let spread = (self.base_delay.as_millis() as u64 / 2).max(1);
        let extra = rand::thread_rng().gen_range(0..=spread);
        (delay + Duration::from_millis(extra)).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2), Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(6, Duration::from_millis(100), Duration::from_millis(500))
            .without_jitter();
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(4), Duration::from_millis(500));
        assert_eq!(policy.backoff(40), Duration::from_millis(500));
    }

    #[test]
    fn test_jitter_stays_within_cap() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100), Duration::from_millis(250));
        for attempt in 1..=5 {
            let d = policy.backoff(attempt);
            assert!(d >= Duration::from_millis(100));
            assert!(d <= Duration::from_millis(250));
        }
    }

    #[test]
    fn test_should_retry_counts_first_attempt() {
        let policy = RetryPolicy::new(3, Duration::ZERO, Duration::ZERO);
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn test_zero_attempts_is_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO, Duration::ZERO).max_attempts, 1);
    }
}
