//! Matching the local library against the rating store.
//!
//! Tracks are matched on (artist, album), both normalized. The album name is
//! the match key in either granularity; in song mode the track name is only
//! used to key the report.

use crate::cancel::CancellationState;
use crate::config::ReconcileConfig;
use crate::events::{EventBroadcaster, SyncEvent};
use crate::library::MusicLibrary;
use crate::normalize::NormalizedKey;
use crate::types::{Granularity, LocalTrack, RatingChange, RatingStore};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// What happened to one local track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackOutcome {
    /// The artist has no ratings at all
    ArtistMiss,
    /// The artist is known but this album is not rated
    AlbumMiss,
    /// A new rating was written
    Updated(RatingChange),
    /// A rating was found but left alone (or the write failed)
    NotUpdated(RatingChange),
}

/// Per-artist detail map: artist → album or song → value
pub type ArtistDetail<T> = BTreeMap<NormalizedKey, BTreeMap<NormalizedKey, T>>;

/// Misses, updates and skips for one granularity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeTable {
    pub miss: ArtistDetail<u32>,
    pub updated: ArtistDetail<RatingChange>,
    pub not_updated: ArtistDetail<RatingChange>,
}

impl OutcomeTable {
    /// Distinct (artist, entity) pairs that missed.
    pub fn miss_entries(&self) -> usize {
        flatten_count(&self.miss)
    }

    /// Sum of all per-entity miss counters.
    pub fn miss_total(&self) -> u64 {
        self.miss
            .values()
            .flat_map(BTreeMap::values)
            .map(|count| u64::from(*count))
            .sum()
    }

    pub fn updated_count(&self) -> usize {
        flatten_count(&self.updated)
    }

    pub fn not_updated_count(&self) -> usize {
        flatten_count(&self.not_updated)
    }
}

fn flatten_count<T>(detail: &ArtistDetail<T>) -> usize {
    detail.values().map(BTreeMap::len).sum()
}

/// Everything a reconciliation pass found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// Artists with no ratings, recorded once each
    pub artist_misses: BTreeMap<NormalizedKey, u32>,
    pub albums: OutcomeTable,
    pub songs: OutcomeTable,
}

impl ReconciliationReport {
    pub fn summary(&self) -> ReconciliationSummary {
        ReconciliationSummary {
            artist_misses: self.artist_misses.len(),
            album_misses: self.albums.miss_entries(),
            albums_updated: self.albums.updated_count(),
            albums_not_updated: self.albums.not_updated_count(),
            song_misses: self.songs.miss_total() as usize,
            songs_updated: self.songs.updated_count(),
            songs_not_updated: self.songs.not_updated_count(),
        }
    }

    fn table_mut(&mut self, granularity: Granularity) -> &mut OutcomeTable {
        match granularity {
            Granularity::Album => &mut self.albums,
            Granularity::Song => &mut self.songs,
        }
    }
}

/// Flattened counts of a [`ReconciliationReport`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub artist_misses: usize,
    pub album_misses: usize,
    pub albums_updated: usize,
    pub albums_not_updated: usize,
    pub song_misses: usize,
    pub songs_updated: usize,
    pub songs_not_updated: usize,
}

impl fmt::Display for ReconciliationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Band misses:        {}", self.artist_misses)?;
        writeln!(f, "Album misses:       {}", self.album_misses)?;
        writeln!(f, "Albums updated:     {}", self.albums_updated)?;
        writeln!(f, "Albums not updated: {}", self.albums_not_updated)?;
        writeln!(f, "Song misses:        {}", self.song_misses)?;
        writeln!(f, "Songs updated:      {}", self.songs_updated)?;
        write!(f, "Songs not updated:  {}", self.songs_not_updated)
    }
}

/// Applies Discogs ratings to a [`MusicLibrary`].
#[derive(Debug, Clone)]
pub struct Reconciler {
    config: ReconcileConfig,
    events: EventBroadcaster,
    cancel: CancellationState,
}

impl Reconciler {
    pub fn new(config: ReconcileConfig, events: EventBroadcaster, cancel: CancellationState) -> Self {
        Self {
            config,
            events,
            cancel,
        }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Run one pass over every track in `library`.
    ///
    /// Failing to enumerate the library is an error. A failed write is
    /// logged, reported as [`SyncEvent::WriteFailed`] and counted as not
    /// updated; the pass carries on with the next track.
    pub async fn reconcile(
        &self,
        store: &RatingStore,
        library: &dyn MusicLibrary,
    ) -> Result<ReconciliationReport> {
        let tracks = library.list_tracks().await?;
        let total_tracks = tracks.len();
        log::info!("Reconciling {total_tracks} tracks");
        self.events
            .broadcast(SyncEvent::ReconcileStarted { total_tracks });

        let mut report = ReconciliationReport::default();
        for (index, track) in tracks.iter().enumerate() {
            self.cancel.check()?;

            let outcome = self.reconcile_track(store, library, track, &mut report).await;
            self.events.broadcast(SyncEvent::TrackProcessed {
                position: index + 1,
                total_tracks,
                outcome,
            });
        }

        self.events.broadcast(SyncEvent::ReconcileCompleted);
        Ok(report)
    }

    async fn reconcile_track(
        &self,
        store: &RatingStore,
        library: &dyn MusicLibrary,
        track: &LocalTrack,
        report: &mut ReconciliationReport,
    ) -> TrackOutcome {
        let artist = NormalizedKey::new(&track.artist);
        let album = NormalizedKey::new(&track.album);
        let song = NormalizedKey::new(&track.name);

        // Untagged tracks never match, whatever the store holds under "".
        let albums = if artist.is_empty() {
            None
        } else {
            store.artist(&artist)
        };
        let Some(albums) = albums else {
            log::debug!("Artist miss: {}", track.artist);
            report.artist_misses.insert(artist, 1);
            return TrackOutcome::ArtistMiss;
        };

        let Some(record) = albums.get(&album) else {
            log::debug!("Album miss: {} - {}", track.artist, track.album);
            report
                .albums
                .miss
                .entry(artist.clone())
                .or_default()
                .insert(album, 1);
            *report
                .songs
                .miss
                .entry(artist)
                .or_default()
                .entry(song)
                .or_default() += 1;
            return TrackOutcome::AlbumMiss;
        };

        let granularity = self.config.granularity;
        let (current, entity) = match granularity {
            Granularity::Album => (track.album_rating, album),
            Granularity::Song => (track.rating, song),
        };
        let change = RatingChange {
            from: current,
            to: record.local_rating(),
        };

        let mut updated = false;
        if self
            .config
            .policy
            .should_update(change.from, change.to, self.config.override_existing)
        {
            let write = match granularity {
                Granularity::Album => library.set_album_rating(&track.id, change.to).await,
                Granularity::Song => library.set_track_rating(&track.id, change.to).await,
            };
            match write {
                Ok(()) => {
                    log::debug!(
                        "Updated {} - {} - {}: {} -> {}",
                        track.artist,
                        track.album,
                        track.name,
                        change.from,
                        change.to
                    );
                    updated = true;
                }
                Err(e) => {
                    log::error!(
                        "Failed to update {} - {} - {}: {e}",
                        track.artist,
                        track.album,
                        track.name
                    );
                    self.events.broadcast(SyncEvent::WriteFailed {
                        track: track.id.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let table = report.table_mut(granularity);
        let detail = if updated {
            &mut table.updated
        } else {
            &mut table.not_updated
        };
        detail
            .entry(artist)
            .or_default()
            .entry(entity)
            .or_insert(change);

        if updated {
            TrackOutcome::Updated(change)
        } else {
            TrackOutcome::NotUpdated(change)
        }
    }
}
