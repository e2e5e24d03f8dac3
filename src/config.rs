use crate::types::{Granularity, UpdatePolicy};
use std::time::Duration;

/// Default Discogs API root.
pub const DEFAULT_BASE_URL: &str = "https://api.discogs.com";

/// Largest page the Discogs API agrees to serve.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Configuration for talking to the Discogs API.
///
/// # Examples
///
/// ```rust
/// use discogs2music::FetchConfig;
/// use std::time::Duration;
///
/// let config = FetchConfig::default()
///     .with_page_size(500)
///     .with_request_timeout(Duration::from_secs(10));
/// assert_eq!(config.page_size, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// API root, without trailing slash
    pub base_url: String,
    /// Releases requested per page (1..=100)
    pub page_size: u32,
    /// Length of the Discogs rate-limit window
    pub cooldown: Duration,
    /// Shortest wait after hitting the rate limit
    pub min_backoff: Duration,
    /// Remaining-quota value below which the client backs off
    pub low_quota_threshold: u32,
    /// Upper bound for a single HTTP exchange
    pub request_timeout: Duration,
    /// Value of the User-Agent header
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: MAX_PAGE_SIZE,
            cooldown: Duration::from_secs(61),
            min_backoff: Duration::from_secs(2),
            low_quota_threshold: 2,
            request_timeout: Duration::from_secs(30),
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        }
    }
}

impl FetchConfig {
    /// Create a new config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the client at another API root (tests, proxies)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Set the page size, clamped to what Discogs accepts
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Set the rate-limit window and the minimum wait
    pub fn with_cooldown(mut self, cooldown: Duration, min_backoff: Duration) -> Self {
        self.cooldown = cooldown;
        self.min_backoff = min_backoff;
        self
    }

    pub fn with_low_quota_threshold(mut self, threshold: u32) -> Self {
        self.low_quota_threshold = threshold;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }
}

/// Configuration for a reconciliation pass over the local library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileConfig {
    /// Which rating field gets written
    pub granularity: Granularity,
    /// When a local rating may be replaced
    pub policy: UpdatePolicy,
    /// Replace ratings regardless of the policy
    pub override_existing: bool,
}

impl ReconcileConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn with_policy(mut self, policy: UpdatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_override(mut self, override_existing: bool) -> Self {
        self.override_existing = override_existing;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_is_capped() {
        assert_eq!(FetchConfig::new().with_page_size(250).page_size, 100);
        assert_eq!(FetchConfig::new().with_page_size(0).page_size, 1);
        assert_eq!(FetchConfig::new().with_page_size(50).page_size, 50);
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let config = FetchConfig::new().with_base_url("http://localhost:8080/");
        assert_eq!(config.base_url, "http://localhost:8080");
    }

    #[test]
    fn test_defaults() {
        let config = FetchConfig::default();
        assert_eq!(config.cooldown, Duration::from_secs(61));
        assert_eq!(config.min_backoff, Duration::from_secs(2));
        assert_eq!(config.low_quota_threshold, 2);
        assert!(config.user_agent.starts_with("discogs2music/"));

        let reconcile = ReconcileConfig::default();
        assert_eq!(reconcile.granularity, Granularity::Album);
        assert_eq!(reconcile.policy, UpdatePolicy::UnsetOnly);
        assert!(!reconcile.override_existing);
    }
}
