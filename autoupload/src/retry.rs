use crate::errors::AutomationError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Delay after the failed attempt `attempt` (zero-based): `base * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(16))
    }
}

/// Runs `op`, retrying rate-limited failures with exponential backoff.
///
/// Any other error is returned immediately without sleeping.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: RetryPolicy,
    mut op: F,
) -> Result<T, AutomationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AutomationError>>,
{
    let mut last_error = None;
    for attempt in 0..policy.max_attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_rate_limited() => {
                if attempt + 1 < policy.max_attempts {
                    let delay = policy.delay_for(attempt);
                    warn!(
                        "Quota exceeded, waiting {}s (attempt {}/{})...",
                        delay.as_secs(),
                        attempt + 1,
                        policy.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                }
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(AutomationError::RetryExhausted {
        attempts: policy.max_attempts,
        last: Box::new(last_error.unwrap_or_else(|| {
            AutomationError::InvalidArgument("retry policy allows zero attempts".to_string())
        })),
    })
}
