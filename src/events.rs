//! # Sync Events
//!
//! This module provides the broadcast channel every component reports
//! through. The fetcher and the reconciler receive an [`EventBroadcaster`]
//! when they are built and publish progress, rate-limit waits and write
//! failures on it; the binary subscribes and renders them.

use crate::reconcile::TrackOutcome;
use crate::types::TrackId;
use http_types::Url;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

/// Query parameters whose values never leave the client
const REDACTED_PARAMS: &[&str] = &["token"];

/// Request information for sync events
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestInfo {
    /// The HTTP method (GET, POST, etc.)
    pub method: String,
    /// Path without query parameters
    pub path: String,
    /// Query parameters as key-value pairs, credentials redacted
    pub query_params: Vec<(String, String)>,
}

impl RequestInfo {
    /// Create RequestInfo from a parsed URL and method
    pub fn from_url(url: &Url, method: &str) -> Self {
        let query_params = url
            .query_pairs()
            .map(|(key, value)| {
                let value = if REDACTED_PARAMS.contains(&key.as_ref()) {
                    "***".to_string()
                } else {
                    value.into_owned()
                };
                (key.into_owned(), value)
            })
            .collect();

        Self {
            method: method.to_string(),
            path: url.path().to_string(),
            query_params,
        }
    }

    /// Get a short description of the request for logging
    pub fn short_description(&self) -> String {
        let mut desc = format!("{} {}", self.method, self.path);
        let params: Vec<String> = self
            .query_params
            .iter()
            .filter(|(k, _)| k == "page")
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        if !params.is_empty() {
            desc.push_str(&format!("?{}", params.join("&")));
        }
        desc
    }
}

/// Why the client decided to back off
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RateLimitType {
    /// HTTP 429 Too Many Requests
    Http429,
    /// The remaining-quota header dropped below the threshold
    LowQuota {
        /// Value of the remaining-quota header
        remaining: u32,
    },
}

/// Event type describing fetch and reconciliation activity
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SyncEvent {
    /// Request started
    RequestStarted {
        /// Request details
        request: RequestInfo,
    },
    /// Request completed
    RequestCompleted {
        /// Request details
        request: RequestInfo,
        /// HTTP status code
        status_code: u16,
        /// Duration of the request in milliseconds
        duration_ms: u64,
    },
    /// Rate limiting detected; the same request is retried after the delay
    RateLimited {
        /// Duration to wait in seconds
        delay_seconds: u64,
        /// Request that triggered the rate limit
        request: Option<RequestInfo>,
        /// Type of rate limiting detected
        rate_limit_type: RateLimitType,
    },
    /// The collection size is known and page fetching begins
    FetchStarted {
        /// Releases in the collection folder
        total_items: u64,
        /// Pages that will be requested
        total_pages: u32,
    },
    /// One page of releases was merged into the store
    PageFetched {
        /// 1-based page number
        page: u32,
        /// Pages that will be requested
        total_pages: u32,
        /// Releases on this page
        releases: usize,
        /// Releases that produced a new store entry
        inserted: usize,
    },
    /// All pages were fetched
    FetchCompleted {
        /// (artist, album) pairs in the merged store
        albums: usize,
    },
    /// The local library was enumerated and the pass begins
    ReconcileStarted {
        /// Tracks that will be examined
        total_tracks: usize,
    },
    /// One track was examined
    TrackProcessed {
        /// 1-based position in the pass
        position: usize,
        /// Tracks that will be examined
        total_tracks: usize,
        /// What happened to the track
        outcome: TrackOutcome,
    },
    /// Writing a rating back to the library failed
    WriteFailed {
        /// Track that could not be updated
        track: TrackId,
        /// Error reported by the library
        message: String,
    },
    /// The reconciliation pass finished
    ReconcileCompleted,
}

/// Type alias for the broadcast receiver
pub type SyncEventReceiver = broadcast::Receiver<SyncEvent>;

/// Shared event broadcasting state that persists across clones
#[derive(Clone)]
pub struct EventBroadcaster {
    event_tx: broadcast::Sender<SyncEvent>,
    last_event_tx: watch::Sender<Option<SyncEvent>>,
}

impl EventBroadcaster {
    /// Create a new event broadcaster
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(256);
        let (last_event_tx, _) = watch::channel(None);

        Self {
            event_tx,
            last_event_tx,
        }
    }

    /// Broadcast an event to all subscribers
    pub fn broadcast(&self, event: SyncEvent) {
        let _ = self.event_tx.send(event.clone());
        self.last_event_tx.send_replace(Some(event));
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> SyncEventReceiver {
        self.event_tx.subscribe()
    }

    /// Get the latest event
    pub fn latest_event(&self) -> Option<SyncEvent> {
        self.last_event_tx.borrow().clone()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBroadcaster")
            .field("subscribers", &self.event_tx.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_info_redacts_token() {
        let url = Url::parse(
            "https://api.discogs.com/users/someone/collection/folders/0/releases?token=secret&per_page=100&page=3",
        )
        .unwrap();
        let info = RequestInfo::from_url(&url, "GET");

        assert_eq!(info.path, "/users/someone/collection/folders/0/releases");
        assert!(info
            .query_params
            .contains(&("token".to_string(), "***".to_string())));
        assert_eq!(
            info.short_description(),
            "GET /users/someone/collection/folders/0/releases?page=3"
        );
    }

    #[tokio::test]
    async fn test_broadcast_reaches_subscribers_and_latest() {
        let broadcaster = EventBroadcaster::new();
        let mut rx = broadcaster.subscribe();
        assert!(broadcaster.latest_event().is_none());

        broadcaster.broadcast(SyncEvent::FetchCompleted { albums: 3 });

        assert_eq!(rx.recv().await.unwrap(), SyncEvent::FetchCompleted { albums: 3 });
        assert_eq!(
            broadcaster.latest_event(),
            Some(SyncEvent::FetchCompleted { albums: 3 })
        );
    }

    #[test]
    fn test_broadcast_without_subscribers_is_silent() {
        let broadcaster = EventBroadcaster::new();
        broadcaster.broadcast(SyncEvent::ReconcileCompleted);
        assert_eq!(broadcaster.latest_event(), Some(SyncEvent::ReconcileCompleted));
    }
}
