use crate::cancel::{sleep_with_cancel, CancellationState};
use crate::config::FetchConfig;
use crate::events::{EventBroadcaster, RequestInfo, SyncEvent};
use crate::headers::add_api_headers;
use crate::normalize::{artist_credit, NormalizedKey};
use crate::rate_limit::{parse_remaining, RateLimiter, REMAINING_HEADER};
use crate::types::{RatingRecord, RatingSnapshot, RatingStore, MAX_SOURCE_RATING};
use crate::{Result, SyncError};
use chrono::Utc;
use http_client::{HttpClient, Request};
use http_types::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::time::Instant;

/// The collection folder every release belongs to ("All")
const ALL_FOLDER: u32 = 0;

/// Client for the Discogs collection API.
///
/// The client validates its API key when it is created, then pages through
/// the user's collection, throttling itself against the Discogs rate limit.
/// Rate-limited requests are repeated until they succeed; the only way out
/// of a long wait is the [`CancellationState`] passed in at construction.
///
/// # Examples
///
/// ```rust,no_run
/// use discogs2music::{CancellationState, DiscogsClient, EventBroadcaster, FetchConfig, Result};
///
/// #[tokio::main]
/// async fn main() -> Result<()> {
///     let http_client = http_client::native::NativeClient::new();
///     let mut client = DiscogsClient::connect(
///         Box::new(http_client),
///         "my-discogs-token",
///         FetchConfig::default(),
///         EventBroadcaster::new(),
///         CancellationState::new(),
///     )
///     .await?;
///
///     let snapshot = client.fetch_ratings(None).await?;
///     println!("{} rated albums", snapshot.ratings.len());
///     Ok(())
/// }
/// ```
pub struct DiscogsClient {
    client: Box<dyn HttpClient>,
    config: FetchConfig,
    token: String,
    identity: ApiIdentity,
    limiter: RateLimiter,
    events: EventBroadcaster,
    cancel: CancellationState,
}

impl DiscogsClient {
    /// Create a client and validate `token` against the identity endpoint.
    ///
    /// Returns [`SyncError::Auth`] if Discogs rejects the token.
    pub async fn connect(
        client: Box<dyn HttpClient>,
        token: &str,
        config: FetchConfig,
        events: EventBroadcaster,
        cancel: CancellationState,
    ) -> Result<Self> {
        let limiter = RateLimiter::new(&config);
        let mut discogs = Self {
            client,
            config,
            token: token.to_string(),
            identity: ApiIdentity::default(),
            limiter,
            events,
            cancel,
        };

        let identity_url = format!("{}/oauth/identity", discogs.config.base_url);
        discogs.identity = discogs.get_json(&identity_url, &[]).await?;
        log::info!("Authenticated with Discogs as {}", discogs.identity.username);

        Ok(discogs)
    }

    /// The Discogs username the token belongs to.
    pub fn username(&self) -> &str {
        &self.identity.username
    }

    pub fn identity(&self) -> &ApiIdentity {
        &self.identity
    }

    /// Fetch every rating in the user's collection.
    ///
    /// Ratings are merged into `existing` (or an empty store) without
    /// overwriting pairs that are already present, including pairs seen on
    /// an earlier page of this same fetch. Any transport or parse failure
    /// aborts the fetch; no partial store is returned.
    pub async fn fetch_ratings(&mut self, existing: Option<RatingStore>) -> Result<RatingSnapshot> {
        log::info!("Fetching ratings from Discogs");
        let last_updated = Utc::now();

        let folder_url = self.folder_url();
        let folder: ApiCollectionFolder = self
            .get_json(&folder_url, &[("page", "1".to_string())])
            .await?;
        let total_pages = total_pages(folder.count, self.config.page_size);
        log::debug!(
            "Collection holds {} releases over {total_pages} pages",
            folder.count
        );
        self.events.broadcast(SyncEvent::FetchStarted {
            total_items: folder.count,
            total_pages,
        });

        let mut store = existing.unwrap_or_default();
        let releases_url = format!("{folder_url}/releases");

        for page in 1..=total_pages {
            log::debug!("Fetching page {page}");
            let content: ApiReleasesPage = self
                .get_json(&releases_url, &[("page", page.to_string())])
                .await?;

            let inserted = merge_releases(&mut store, &content.releases);
            self.events.broadcast(SyncEvent::PageFetched {
                page,
                total_pages,
                releases: content.releases.len(),
                inserted,
            });
        }

        self.events.broadcast(SyncEvent::FetchCompleted {
            albums: store.len(),
        });

        Ok(RatingSnapshot {
            last_updated,
            ratings: store,
        })
    }

    fn folder_url(&self) -> String {
        format!(
            "{}/collection/folders/{ALL_FOLDER}",
            self.identity.resource_url.trim_end_matches('/')
        )
    }

    fn build_url(&self, url: &str, params: &[(&str, String)]) -> Result<Url> {
        let mut url =
            Url::parse(url).map_err(|e| SyncError::Http(format!("Invalid URL {url}: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("token", &self.token);
            query.append_pair("per_page", &self.config.page_size.to_string());
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &mut self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = self.build_url(url, params)?;
        let body = self.get_with_rate_limit(&url).await?;
        serde_json::from_str(&body)
            .map_err(|e| SyncError::Parse(format!("{}: {e}", url.path())))
    }

    /// GET a URL, waiting out the rate limit as often as it takes
    async fn get_with_rate_limit(&mut self, url: &Url) -> Result<String> {
        loop {
            self.cancel.check()?;

            match self.get_once(url).await {
                Err(SyncError::RateLimit { .. }) => {
                    let delay = self.limiter.begin_cooldown();
                    log::info!("Waiting {}s before retrying", delay.as_secs());
                    sleep_with_cancel(self.cancel.subscribe(), delay).await?;
                }
                other => return other,
            }
        }
    }

    async fn get_once(&self, url: &Url) -> Result<String> {
        let mut request = Request::new(Method::Get, url.clone());
        add_api_headers(&mut request, &self.config.user_agent);

        let request_info = RequestInfo::from_url(url, "GET");
        let request_start = Instant::now();
        self.events.broadcast(SyncEvent::RequestStarted {
            request: request_info.clone(),
        });

        let exchange = async {
            let mut response = self
                .client
                .send(request)
                .await
                .map_err(|e| SyncError::Http(e.to_string()))?;
            let status: u16 = response.status().into();
            let remaining = parse_remaining(
                response
                    .header(REMAINING_HEADER)
                    .map(|values| values.last().as_str()),
            );
            let body = response
                .body_string()
                .await
                .map_err(|e| SyncError::Http(e.to_string()))?;
            Ok::<_, SyncError>((status, remaining, body))
        };

        let (status, remaining, body) =
            tokio::time::timeout(self.config.request_timeout, exchange)
                .await
                .map_err(|_| {
                    SyncError::Http(format!(
                        "{} timed out after {}s",
                        request_info.short_description(),
                        self.config.request_timeout.as_secs()
                    ))
                })??;

        self.events.broadcast(SyncEvent::RequestCompleted {
            request: request_info.clone(),
            status_code: status,
            duration_ms: request_start.elapsed().as_millis() as u64,
        });

        if let Some(rate_limit_type) = self.limiter.check(status, remaining) {
            let retry_after = self.limiter.delay_at(Instant::now()).as_secs();
            log::warn!("API rate limit reached.");
            log::debug!(
                "{} limited ({rate_limit_type:?})",
                request_info.short_description()
            );
            self.events.broadcast(SyncEvent::RateLimited {
                delay_seconds: retry_after,
                request: Some(request_info),
                rate_limit_type,
            });
            return Err(SyncError::RateLimit { retry_after });
        }

        match status {
            200..=299 => Ok(body),
            401 | 403 => Err(SyncError::Auth(
                api_message(&body).unwrap_or_else(|| format!("HTTP {status}")),
            )),
            _ => Err(SyncError::Http(format!(
                "{} returned HTTP {status}: {}",
                request_info.short_description(),
                api_message(&body).unwrap_or_default()
            ))),
        }
    }
}

/// Number of pages needed to list `count` releases, `page_size` at a time.
pub fn total_pages(count: u64, page_size: u32) -> u32 {
    let page_size = u64::from(page_size.max(1));
    count.div_ceil(page_size) as u32
}

/// Insert one page of releases into `store`, keeping existing entries.
///
/// Returns the number of new (artist, album) pairs.
pub fn merge_releases(store: &mut RatingStore, releases: &[ApiRelease]) -> usize {
    let mut inserted = 0;
    for release in releases {
        let Some(record) = release.record() else {
            log::warn!(
                "Skipping release {} with out-of-range rating {}",
                release.id,
                release.rating
            );
            continue;
        };
        let (artist, album) = release.keys();
        log::debug!(
            "{} - [{}] {}",
            release.artist_credit(),
            release.rating,
            release.basic_information.title
        );
        if store.insert_if_absent(artist, album, record) {
            inserted += 1;
        }
    }
    inserted
}

fn api_message(body: &str) -> Option<String> {
    serde_json::from_str::<ApiMessage>(body)
        .ok()
        .map(|message| message.message)
}

// =============================================================================
// Discogs API payloads
// =============================================================================

/// `GET /oauth/identity`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiIdentity {
    pub id: u64,
    pub username: String,
    pub resource_url: String,
    #[serde(default)]
    pub consumer_name: Option<String>,
}

/// `GET {resource_url}/collection/folders/0`
#[derive(Debug, Clone, Deserialize)]
pub struct ApiCollectionFolder {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    pub count: u64,
}

/// `GET {resource_url}/collection/folders/0/releases`
#[derive(Debug, Clone, Deserialize)]
pub struct ApiReleasesPage {
    pub pagination: ApiPagination,
    pub releases: Vec<ApiRelease>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiPagination {
    #[serde(default)]
    pub page: u32,
    pub pages: u32,
    #[serde(default)]
    pub per_page: u32,
    #[serde(default)]
    pub items: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiRelease {
    pub id: u64,
    pub instance_id: u64,
    pub rating: i64,
    pub basic_information: ApiBasicInformation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiBasicInformation {
    pub title: String,
    #[serde(default)]
    pub artists: Vec<ApiArtist>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiArtist {
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    message: String,
}

impl ApiRelease {
    /// Credited artists joined into one name, disambiguators removed.
    pub fn artist_credit(&self) -> String {
        artist_credit(
            self.basic_information
                .artists
                .iter()
                .map(|artist| artist.name.as_str()),
        )
    }

    /// Normalized (artist, album) keys of this release.
    pub fn keys(&self) -> (NormalizedKey, NormalizedKey) {
        (
            NormalizedKey::new(&self.artist_credit()),
            NormalizedKey::new(&self.basic_information.title),
        )
    }

    /// The rating record, or `None` if the rating is off the Discogs scale.
    pub fn record(&self) -> Option<RatingRecord> {
        let rating = u8::try_from(self.rating)
            .ok()
            .filter(|rating| *rating <= MAX_SOURCE_RATING)?;
        Some(RatingRecord::new(rating).with_ids(self.id, self.instance_id))
    }
}

pub fn parse_releases_page(json: &str) -> Result<ApiReleasesPage> {
    serde_json::from_str(json).map_err(|e| SyncError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"{
        "pagination": { "page": 1, "pages": 1, "per_page": 100, "items": 3, "urls": {} },
        "releases": [
            {
                "id": 367084,
                "instance_id": 1001,
                "date_added": "2021-03-01T10:00:00-08:00",
                "rating": 5,
                "basic_information": {
                    "title": "Nevermind",
                    "year": 1991,
                    "artists": [ { "name": "Nirvana (2)", "id": 125246 } ]
                }
            },
            {
                "id": 1,
                "instance_id": 1002,
                "rating": 3,
                "basic_information": {
                    "title": "Under Pressure",
                    "artists": [ { "name": "Queen" }, { "name": "David Bowie" } ]
                }
            },
            {
                "id": 2,
                "instance_id": 1003,
                "rating": 4,
                "basic_information": {
                    "title": "NEVERMIND",
                    "artists": [ { "name": "Nirvana" } ]
                }
            }
        ]
    }"#;

    #[test]
    fn test_parse_releases_page() {
        let page = parse_releases_page(PAGE).unwrap();
        assert_eq!(page.pagination.pages, 1);
        assert_eq!(page.releases.len(), 3);
        assert_eq!(page.releases[0].artist_credit(), "Nirvana");
        assert_eq!(page.releases[1].artist_credit(), "Queen - David Bowie");
    }

    #[test]
    fn test_merge_releases_first_write_wins_within_page() {
        let page = parse_releases_page(PAGE).unwrap();
        let mut store = RatingStore::new();

        assert_eq!(merge_releases(&mut store, &page.releases), 2);

        let nevermind = store
            .get(&NormalizedKey::new("nirvana"), &NormalizedKey::new("nevermind"))
            .unwrap();
        assert_eq!(nevermind.rating, 5);
        assert_eq!(nevermind.source_id, Some(367084));
        assert_eq!(nevermind.instance_id, Some(1001));
        assert!(store
            .get(
                &NormalizedKey::new("queen-david-bowie"),
                &NormalizedKey::new("under pressure")
            )
            .is_some());
    }

    #[test]
    fn test_merge_releases_keeps_cached_ratings() {
        let page = parse_releases_page(PAGE).unwrap();
        let mut store = RatingStore::new();
        store.insert_if_absent(
            NormalizedKey::new("Nirvana"),
            NormalizedKey::new("Nevermind"),
            RatingRecord::new(3),
        );

        merge_releases(&mut store, &page.releases);

        let nevermind = store
            .get(&NormalizedKey::new("nirvana"), &NormalizedKey::new("nevermind"))
            .unwrap();
        assert_eq!(nevermind.rating, 3);
        assert_eq!(nevermind.source_id, None);
    }

    #[test]
    fn test_out_of_range_rating_is_skipped() {
        let json = r#"{
            "pagination": { "pages": 1 },
            "releases": [ {
                "id": 9, "instance_id": 9, "rating": 7,
                "basic_information": { "title": "Odd", "artists": [ { "name": "Someone" } ] }
            } ]
        }"#;
        let page = parse_releases_page(json).unwrap();
        let mut store = RatingStore::new();
        assert_eq!(merge_releases(&mut store, &page.releases), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_malformed_page_is_parse_error() {
        let result = parse_releases_page(r#"{ "releases": "nope" }"#);
        assert!(matches!(result, Err(SyncError::Parse(_))));
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(250, 100), 3);
        assert_eq!(total_pages(200, 100), 2);
        assert_eq!(total_pages(0, 100), 0);
        assert_eq!(total_pages(1, 100), 1);
    }

    #[test]
    fn test_api_message() {
        assert_eq!(
            api_message(r#"{"message": "You must authenticate to access this resource."}"#),
            Some("You must authenticate to access this resource.".to_string())
        );
        assert_eq!(api_message("<html>"), None);
    }
}
