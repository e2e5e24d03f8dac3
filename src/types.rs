//! Data types for Discogs ratings and local library tracks.
//!
//! This module contains the core data structures shared by the fetcher, the
//! reconciler and the data file: the two-level rating store, the snapshot
//! that gets persisted, the read-only view of a library track, and the
//! switches that steer reconciliation.

use crate::normalize::NormalizedKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;

/// Highest rating on the Discogs scale.
pub const MAX_SOURCE_RATING: u8 = 5;

/// Multiplier mapping the Discogs 0-5 scale onto the Music app 0-100 scale.
pub const CONVERSION_RATIO: u8 = 20;

// ================================================================================================
// RATINGS
// ================================================================================================

/// One Discogs rating for one album in the user's collection.
///
/// # Examples
///
/// ```rust
/// use discogs2music::RatingRecord;
///
/// let record = RatingRecord::new(4).with_ids(1234, 98765);
/// assert_eq!(record.local_rating(), 80);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingRecord {
    /// Rating on the Discogs scale (0-5, 0 meaning unrated)
    pub rating: u8,
    /// Discogs release id
    #[serde(rename = "id", default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<u64>,
    /// Discogs collection instance id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<u64>,
}

impl RatingRecord {
    pub fn new(rating: u8) -> Self {
        Self {
            rating,
            source_id: None,
            instance_id: None,
        }
    }

    pub fn with_ids(mut self, source_id: u64, instance_id: u64) -> Self {
        self.source_id = Some(source_id);
        self.instance_id = Some(instance_id);
        self
    }

    /// Whether the rating lies on the Discogs scale.
    pub fn is_valid(&self) -> bool {
        self.rating <= MAX_SOURCE_RATING
    }

    /// The rating converted to the Music app scale.
    pub fn local_rating(&self) -> u8 {
        self.rating.min(MAX_SOURCE_RATING) * CONVERSION_RATIO
    }
}

type RawRatings = BTreeMap<String, BTreeMap<String, RatingRecord>>;

/// Ratings keyed by normalized artist, then normalized album.
///
/// A key pair is written once: inserting a pair that is already present
/// leaves the stored record untouched, and records with a rating outside
/// the Discogs scale are never stored.
///
/// Deserializing re-normalizes every key, so documents written with
/// differently-cased keys collapse onto the same entries (first key in
/// sorted order wins).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "RawRatings")]
pub struct RatingStore {
    artists: BTreeMap<NormalizedKey, BTreeMap<NormalizedKey, RatingRecord>>,
}

impl RatingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record unless the (artist, album) pair is already stored.
    ///
    /// Returns `true` if the record was inserted.
    pub fn insert_if_absent(
        &mut self,
        artist: NormalizedKey,
        album: NormalizedKey,
        record: RatingRecord,
    ) -> bool {
        if !record.is_valid() {
            log::warn!(
                "Ignoring out-of-range rating {} for {artist} / {album}",
                record.rating
            );
            return false;
        }

        match self.artists.entry(artist).or_default().entry(album) {
            Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Merge `other` into this store without overwriting existing pairs.
    ///
    /// Returns the number of pairs taken from `other`.
    pub fn merge(&mut self, other: RatingStore) -> usize {
        let mut inserted = 0;
        for (artist, albums) in other.artists {
            for (album, record) in albums {
                if self.insert_if_absent(artist.clone(), album, record) {
                    inserted += 1;
                }
            }
        }
        inserted
    }

    /// All albums rated for an artist.
    pub fn artist(&self, artist: &NormalizedKey) -> Option<&BTreeMap<NormalizedKey, RatingRecord>> {
        self.artists.get(artist)
    }

    pub fn get(&self, artist: &NormalizedKey, album: &NormalizedKey) -> Option<&RatingRecord> {
        self.artists.get(artist).and_then(|albums| albums.get(album))
    }

    pub fn contains_artist(&self, artist: &NormalizedKey) -> bool {
        self.artists.contains_key(artist)
    }

    /// Number of distinct artists.
    pub fn artist_count(&self) -> usize {
        self.artists.len()
    }

    /// Number of (artist, album) pairs.
    pub fn len(&self) -> usize {
        self.artists.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over every (artist, album, record) triple in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&NormalizedKey, &NormalizedKey, &RatingRecord)> {
        self.artists.iter().flat_map(|(artist, albums)| {
            albums
                .iter()
                .map(move |(album, record)| (artist, album, record))
        })
    }
}

impl From<RawRatings> for RatingStore {
    fn from(raw: RawRatings) -> Self {
        let mut store = RatingStore::new();
        for (artist, albums) in raw {
            let artist = NormalizedKey::new(&artist);
            for (album, record) in albums {
                store.insert_if_absent(artist.clone(), NormalizedKey::new(&album), record);
            }
        }
        store
    }
}

impl Serialize for RatingStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.artists.serialize(serializer)
    }
}

fn unix_epoch() -> DateTime<Utc> {
    DateTime::<Utc>::default()
}

/// A rating store together with the time its newest fetch was captured.
///
/// This is the document kept in the data file:
///
/// ```json
/// { "last_updated": 1700000000, "ratings": { "nirvana": { "nevermind": { "rating": 5 } } } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingSnapshot {
    /// Capture time of the fetch; informational only
    #[serde(with = "chrono::serde::ts_seconds", default = "unix_epoch")]
    pub last_updated: DateTime<Utc>,
    /// The ratings themselves
    #[serde(default)]
    pub ratings: RatingStore,
}

impl RatingSnapshot {
    pub fn new(ratings: RatingStore) -> Self {
        Self {
            last_updated: Utc::now(),
            ratings,
        }
    }
}

impl Default for RatingSnapshot {
    fn default() -> Self {
        Self {
            last_updated: unix_epoch(),
            ratings: RatingStore::new(),
        }
    }
}

// ================================================================================================
// LOCAL LIBRARY
// ================================================================================================

/// Identifier of a track inside the local music library.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub String);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Read-only view of one playable item in the local library.
///
/// Ratings use the Music app 0-100 scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalTrack {
    pub id: TrackId,
    pub artist: String,
    pub album: String,
    pub name: String,
    pub album_rating: u8,
    pub rating: u8,
}

impl LocalTrack {
    pub fn new(id: &str, artist: &str, album: &str, name: &str) -> Self {
        Self {
            id: TrackId::from(id),
            artist: artist.to_string(),
            album: album.to_string(),
            name: name.to_string(),
            album_rating: 0,
            rating: 0,
        }
    }

    pub fn with_album_rating(mut self, album_rating: u8) -> Self {
        self.album_rating = album_rating;
        self
    }

    pub fn with_rating(mut self, rating: u8) -> Self {
        self.rating = rating;
        self
    }
}

// ================================================================================================
// RECONCILIATION SWITCHES
// ================================================================================================

/// Which rating field a reconciliation pass writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// The album-level rating of each track
    #[default]
    Album,
    /// The per-track rating
    Song,
}

/// When a local rating may be replaced by the Discogs one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePolicy {
    /// Only fill in ratings that are unset (zero)
    #[default]
    UnsetOnly,
    /// Replace a rating when the Discogs one is strictly higher
    GreaterThan,
}

impl UpdatePolicy {
    /// Decide whether `current` should become `remote`.
    ///
    /// `override_existing` forces an update under either policy.
    pub fn should_update(self, current: u8, remote: u8, override_existing: bool) -> bool {
        if override_existing {
            return true;
        }
        match self {
            UpdatePolicy::UnsetOnly => current == 0,
            UpdatePolicy::GreaterThan => remote > current,
        }
    }
}

/// A rating value before and after a (possible) update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingChange {
    pub from: u8,
    pub to: u8,
}

// ================================================================================================
// TESTS
// ================================================================================================
