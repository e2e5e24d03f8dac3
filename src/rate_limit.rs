use crate::config::FetchConfig;
use crate::events::RateLimitType;
use std::time::Duration;
use tokio::time::Instant;

/// Response header carrying the number of requests left in the current window
pub const REMAINING_HEADER: &str = "X-Discogs-Ratelimit-Remaining";

/// Status code Discogs answers with once the window is exhausted
pub const TOO_MANY_REQUESTS: u16 = 429;

/// Self-throttling state for the Discogs API.
///
/// Discogs allows a fixed number of requests per rolling window and reports
/// what is left on every response. Once the quota runs low (or the server
/// answers 429) the client waits for the rest of the window, measured from
/// the previous time it had to wait, and never less than `min_backoff`.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    cooldown: Duration,
    min_backoff: Duration,
    low_quota_threshold: u32,
    last_block: Instant,
}

impl RateLimiter {
    pub fn new(config: &FetchConfig) -> Self {
        Self {
            cooldown: config.cooldown,
            min_backoff: config.min_backoff,
            low_quota_threshold: config.low_quota_threshold,
            last_block: Instant::now(),
        }
    }

    /// Inspect a response and decide whether the request has to be repeated.
    ///
    /// `remaining` is the parsed remaining-quota header, if present.
    pub fn check(&self, status: u16, remaining: Option<u32>) -> Option<RateLimitType> {
        if status == TOO_MANY_REQUESTS {
            return Some(RateLimitType::Http429);
        }
        match remaining {
            Some(remaining) if remaining < self.low_quota_threshold => {
                Some(RateLimitType::LowQuota { remaining })
            }
            _ => None,
        }
    }

    /// The wait that would apply if the limit were hit at `now`.
    pub fn delay_at(&self, now: Instant) -> Duration {
        let since_last_block = now.saturating_duration_since(self.last_block);
        self.cooldown
            .saturating_sub(since_last_block)
            .max(self.min_backoff)
    }

    /// Compute the wait for a limit hit right now and start a new window.
    pub fn begin_cooldown(&mut self) -> Duration {
        let now = Instant::now();
        let delay = self.delay_at(now);
        self.last_block = now;
        delay
    }
}

/// Parse the remaining-quota header value.
pub fn parse_remaining(value: Option<&str>) -> Option<u32> {
    value.and_then(|v| v.trim().parse::<u32>().ok())
}
