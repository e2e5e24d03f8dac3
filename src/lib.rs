//! # discogs2music
//!
//! Copy the ratings of your Discogs collection into your local Music library.
//!
//! A run has two halves. [`DiscogsClient`] pages through the collection,
//! waiting out the Discogs rate limit as needed, and builds a [`RatingStore`]
//! keyed by normalized artist and album names. [`Reconciler`] then walks every
//! track of a [`MusicLibrary`], looks its album up in the store and writes the
//! rating (converted from the 0-5 to the 0-100 scale) where the configured
//! [`UpdatePolicy`] allows it.
//!
//! ```rust,no_run
//! use discogs2music::{
//!     run_sync, CancellationState, DataFile, EventBroadcaster, MusicAppLibrary, Result,
//!     SyncOptions,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let options = SyncOptions::new(DataFile::default()).with_api_key("my-discogs-token");
//!     let outcome = run_sync(
//!         Box::new(http_client::native::NativeClient::new()),
//!         &MusicAppLibrary::new(),
//!         &options,
//!         &EventBroadcaster::new(),
//!         &CancellationState::new(),
//!     )
//!     .await?;
//!     println!("{}", outcome.report.summary());
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod config;
pub mod discogs;
pub mod error;
pub mod events;
pub mod headers;
pub mod library;
pub mod music_app;
pub mod normalize;
pub mod persistence;
pub mod rate_limit;
pub mod reconcile;
pub mod sync;
pub mod types;

pub use cancel::{sleep_with_cancel, CancellationState};
pub use config::{FetchConfig, ReconcileConfig, DEFAULT_BASE_URL, MAX_PAGE_SIZE};
pub use discogs::DiscogsClient;
pub use error::SyncError;
pub use events::{EventBroadcaster, RateLimitType, RequestInfo, SyncEvent, SyncEventReceiver};
#[cfg(feature = "mock")]
pub use library::MockMusicLibrary;
pub use library::{MemoryLibrary, MusicLibrary};
pub use music_app::MusicAppLibrary;
pub use normalize::{normalize, NormalizedKey};
pub use persistence::DataFile;
pub use rate_limit::RateLimiter;
pub use reconcile::{
    OutcomeTable, ReconciliationReport, ReconciliationSummary, Reconciler, TrackOutcome,
};
pub use sync::{run_sync, SyncOptions, SyncOutcome};
pub use types::{
    Granularity, LocalTrack, RatingChange, RatingRecord, RatingSnapshot, RatingStore, TrackId,
    UpdatePolicy, CONVERSION_RATIO,
};

pub type Result<T> = std::result::Result<T, SyncError>;
