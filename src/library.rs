use crate::types::{LocalTrack, TrackId};
use crate::{Result, SyncError};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

/// Access to a local music library.
///
/// The reconciler only needs to enumerate tracks and write one of the two
/// rating fields back. Ratings are on the 0-100 scale.
///
/// # Mocking Support
///
/// When the `mock` feature is enabled, this crate provides `MockMusicLibrary`
/// that implements this trait using the `mockall` library.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait(?Send)]
pub trait MusicLibrary {
    /// Every playable track in the library.
    async fn list_tracks(&self) -> Result<Vec<LocalTrack>>;

    /// Set the album rating on the track with the given id.
    async fn set_album_rating(&self, id: &TrackId, value: u8) -> Result<()>;

    /// Set the track's own rating.
    async fn set_track_rating(&self, id: &TrackId, value: u8) -> Result<()>;
}

/// In-memory library for tests and for callers that keep their own catalogue.
#[derive(Debug, Default)]
pub struct MemoryLibrary {
    tracks: Mutex<Vec<LocalTrack>>,
    read_only: HashSet<TrackId>,
}

impl MemoryLibrary {
    pub fn new(tracks: Vec<LocalTrack>) -> Self {
        Self {
            tracks: Mutex::new(tracks),
            read_only: HashSet::new(),
        }
    }

    /// Make writes to `id` fail, the way a locked file or a cloud-only
    /// track does in a real library.
    pub fn with_read_only(mut self, id: &str) -> Self {
        self.read_only.insert(TrackId::from(id));
        self
    }

    /// Current state of every track.
    pub fn tracks(&self) -> Vec<LocalTrack> {
        self.lock().clone()
    }

    pub fn track(&self, id: &str) -> Option<LocalTrack> {
        self.lock().iter().find(|track| track.id.0 == id).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LocalTrack>> {
        self.tracks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update(&self, id: &TrackId, apply: impl FnOnce(&mut LocalTrack)) -> Result<()> {
        if self.read_only.contains(id) {
            return Err(SyncError::Library(format!("Track {id} is read-only")));
        }
        let mut tracks = self.lock();
        let track = tracks
            .iter_mut()
            .find(|track| &track.id == id)
            .ok_or_else(|| SyncError::Library(format!("No track with id {id}")))?;
        apply(track);
        Ok(())
    }
}

#[async_trait(?Send)]
impl MusicLibrary for MemoryLibrary {
    async fn list_tracks(&self) -> Result<Vec<LocalTrack>> {
        Ok(self.tracks())
    }

    async fn set_album_rating(&self, id: &TrackId, value: u8) -> Result<()> {
        self.update(id, |track| track.album_rating = value)
    }

    async fn set_track_rating(&self, id: &TrackId, value: u8) -> Result<()> {
        self.update(id, |track| track.rating = value)
    }
}
