use async_trait::async_trait;
use std::time::Duration;

/// Paces consecutive oracle calls within one run.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Wait until the next call may be issued.
    async fn pause(&self);
}

/// Static sleep between calls.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

#[async_trait]
impl RateLimiter for FixedDelay {
    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}
