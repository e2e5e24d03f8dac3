use crate::cancel::CancellationState;
use crate::config::{FetchConfig, ReconcileConfig};
use crate::discogs::DiscogsClient;
use crate::events::EventBroadcaster;
use crate::library::MusicLibrary;
use crate::persistence::DataFile;
use crate::reconcile::{ReconciliationReport, Reconciler};
use crate::types::RatingSnapshot;
use crate::{Result, SyncError};
use http_client::HttpClient;

/// Settings for one complete run.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Discogs personal access token; required unless `local_only` is set
    pub api_key: Option<String>,
    pub data_file: DataFile,
    /// Skip the fetch and reconcile against the cached ratings only
    pub local_only: bool,
    pub fetch: FetchConfig,
    pub reconcile: ReconcileConfig,
}

impl SyncOptions {
    pub fn new(data_file: DataFile) -> Self {
        Self {
            data_file,
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    pub fn with_local_only(mut self, local_only: bool) -> Self {
        self.local_only = local_only;
        self
    }

    pub fn with_fetch_config(mut self, fetch: FetchConfig) -> Self {
        self.fetch = fetch;
        self
    }

    pub fn with_reconcile_config(mut self, reconcile: ReconcileConfig) -> Self {
        self.reconcile = reconcile;
        self
    }
}

/// What a run produced.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// The ratings the library was reconciled against
    pub snapshot: RatingSnapshot,
    pub report: ReconciliationReport,
    /// Whether the ratings came from a fresh fetch
    pub fetched: bool,
}

/// Load cached ratings, refresh them from Discogs, save, then reconcile.
///
/// The data file is only written after a fetch completed; a failed save is
/// logged and the run continues with the fetched ratings.
pub async fn run_sync(
    http_client: Box<dyn HttpClient>,
    library: &dyn MusicLibrary,
    options: &SyncOptions,
    events: &EventBroadcaster,
    cancel: &CancellationState,
) -> Result<SyncOutcome> {
    let cached = options.data_file.load();

    let (snapshot, fetched) = if options.local_only {
        log::info!(
            "Using cached ratings from {}",
            options.data_file.path().display()
        );
        (cached.unwrap_or_default(), false)
    } else {
        let api_key = options
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| SyncError::Auth("No Discogs API key given".to_string()))?;

        let mut client = DiscogsClient::connect(
            http_client,
            api_key,
            options.fetch.clone(),
            events.clone(),
            cancel.clone(),
        )
        .await?;
        let snapshot = client
            .fetch_ratings(cached.map(|snapshot| snapshot.ratings))
            .await?;

        if let Err(e) = options.data_file.save(&snapshot) {
            log::warn!("Could not save ratings: {e}");
        }
        (snapshot, true)
    };

    log::info!(
        "{} rated albums from {} artists",
        snapshot.ratings.len(),
        snapshot.ratings.artist_count()
    );

    let reconciler = Reconciler::new(options.reconcile, events.clone(), cancel.clone());
    let report = reconciler.reconcile(&snapshot.ratings, library).await?;

    Ok(SyncOutcome {
        snapshot,
        report,
        fetched,
    })
}
