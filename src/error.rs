use thiserror::Error;

/// Error types for Discogs fetches, rating store persistence and library updates.
///
/// Only [`Auth`](SyncError::Auth), [`Http`](SyncError::Http),
/// [`Parse`](SyncError::Parse) and [`Cancelled`](SyncError::Cancelled) end a
/// run. Everything else is recovered where it happens: rate limits are waited
/// out inside the fetcher, persistence problems degrade to an empty store, and
/// a failed library write is counted as "not updated".
///
/// # Error Handling Examples
///
/// ```rust,no_run
/// use discogs2music::{CancellationState, DiscogsClient, EventBroadcaster, FetchConfig, SyncError};
///
/// #[tokio::main]
/// async fn main() {
///     let http_client = http_client::native::NativeClient::new();
///     match DiscogsClient::connect(
///         Box::new(http_client),
///         "my-token",
///         FetchConfig::default(),
///         EventBroadcaster::new(),
///         CancellationState::new(),
///     )
///     .await
///     {
///         Ok(client) => println!("Connected as {}", client.username()),
///         Err(SyncError::Auth(msg)) => eprintln!("Invalid API key: {}", msg),
///         Err(SyncError::Http(msg)) => eprintln!("Network error: {}", msg),
///         Err(e) => eprintln!("Other error: {}", e),
///     }
/// }
/// ```
#[derive(Error, Debug)]
pub enum SyncError {
    /// HTTP/network related errors.
    ///
    /// This includes connection failures, timeouts, DNS errors and
    /// unexpected HTTP statuses returned by the Discogs API.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The API key was rejected by the identity endpoint.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Failed to parse a Discogs response body.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Rate limiting from Discogs.
    ///
    /// Never returned to callers of the fetcher: the request loop waits
    /// out the cooldown and retries the same request.
    #[error("Rate limited, retry after {retry_after} seconds")]
    RateLimit {
        /// Number of seconds to wait before retrying
        retry_after: u64,
    },

    /// The run was interrupted through a [`CancellationState`](crate::CancellationState).
    #[error("Operation cancelled")]
    Cancelled,

    /// Loading or saving the rating data file failed.
    #[error("Data file error: {0}")]
    Persistence(String),

    /// Reading from or writing to the local music library failed.
    #[error("Music library error: {0}")]
    Library(String),
}

impl SyncError {
    /// Short category name used for the one-line user-facing message.
    pub fn category(&self) -> &'static str {
        match self {
            SyncError::Http(_) => "network",
            SyncError::Auth(_) => "authentication",
            SyncError::Parse(_) => "response",
            SyncError::RateLimit { .. } => "rate limit",
            SyncError::Cancelled => "cancelled",
            SyncError::Persistence(_) => "data file",
            SyncError::Library(_) => "music library",
        }
    }

    /// Whether this error should stop the whole run.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            SyncError::RateLimit { .. } | SyncError::Persistence(_)
        )
    }
}
