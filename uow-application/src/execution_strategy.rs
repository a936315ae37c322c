//! 执行策略（重试）
//!
//! 工作单元在一次尝试失败后询问策略是否、以及等待多久后重试。
//! 只有被分类为瞬时的错误（`AppError::is_transient`）才会重试，
//! 每次重试都在全新的事务中进行。
//!
use crate::error::AppError;
use bon::Builder;
use std::time::Duration;

pub trait ExecutionStrategy: Send + Sync {
    /// 该策略是否会重试失败的尝试
    fn retries_on_failure(&self) -> bool;

    /// 第 `attempt` 次（从 1 开始）尝试以 `error` 失败后，返回重试前的等待时长；
    /// `None` 表示不再重试
    fn next_delay(&self, attempt: u32, error: &AppError) -> Option<Duration>;
}

/// 不重试：首个错误原样返回
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetryStrategy;

impl ExecutionStrategy for NoRetryStrategy {
    fn retries_on_failure(&self) -> bool {
        false
    }

    fn next_delay(&self, _attempt: u32, _error: &AppError) -> Option<Duration> {
        None
    }
}

/// 指数退避参数
#[derive(Builder, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 首次尝试之外的最大重试次数
    #[builder(default = 6)]
    pub max_retries: u32,
    #[builder(default = Duration::from_millis(100))]
    pub base_delay: Duration,
    #[builder(default = Duration::from_secs(30))]
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RetryPolicy {
    /// `base_delay * 2^(attempt-1)`，上限 `max_delay`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// 对瞬时错误按 `RetryPolicy` 退避重试
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryingExecutionStrategy {
    policy: RetryPolicy,
}

impl RetryingExecutionStrategy {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl ExecutionStrategy for RetryingExecutionStrategy {
    fn retries_on_failure(&self) -> bool {
        true
    }

    fn next_delay(&self, attempt: u32, error: &AppError) -> Option<Duration> {
        if !error.is_transient() || attempt > self.policy.max_retries {
            return None;
        }
        Some(self.policy.delay_for(attempt))
    }
}
