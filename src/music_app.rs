//! Music app library access through `osascript`.
//!
//! Scripts are JavaScript for Automation. Reads return JSON on stdout; writes
//! address a track by its persistent ID.

use crate::library::MusicLibrary;
use crate::types::{LocalTrack, TrackId};
use crate::{Result, SyncError};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

const LIST_TRACKS_SCRIPT: &str = r#"
const tracks = Application("Music").libraryPlaylists[0].tracks;
const ids = tracks.persistentID();
const artists = tracks.artist();
const albums = tracks.album();
const names = tracks.name();
const albumRatings = tracks.albumRating();
const ratings = tracks.rating();
JSON.stringify(ids.map((id, i) => ({
    id: id,
    artist: artists[i] || "",
    album: albums[i] || "",
    name: names[i] || "",
    albumRating: albumRatings[i] || 0,
    rating: ratings[i] || 0
})));
"#;

/// Fields the list script emits per track
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScriptTrack {
    id: String,
    artist: String,
    album: String,
    name: String,
    album_rating: i64,
    rating: i64,
}

impl From<ScriptTrack> for LocalTrack {
    fn from(track: ScriptTrack) -> Self {
        LocalTrack::new(&track.id, &track.artist, &track.album, &track.name)
            .with_album_rating(clamp_rating(track.album_rating))
            .with_rating(clamp_rating(track.rating))
    }
}

fn clamp_rating(value: i64) -> u8 {
    value.clamp(0, 100) as u8
}

/// The macOS Music app library.
#[derive(Debug, Clone)]
pub struct MusicAppLibrary {
    osascript: String,
}

impl Default for MusicAppLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl MusicAppLibrary {
    pub fn new() -> Self {
        Self {
            osascript: "osascript".to_string(),
        }
    }

    /// Use a different `osascript` executable.
    pub fn with_osascript(mut self, program: &str) -> Self {
        self.osascript = program.to_string();
        self
    }

    async fn run_script(&self, script: &str) -> Result<String> {
        let output = Command::new(&self.osascript)
            .args(["-l", "JavaScript", "-e", script])
            .output()
            .await
            .map_err(|e| SyncError::Library(format!("Failed to run {}: {e}", self.osascript)))?;

        if !output.status.success() {
            return Err(SyncError::Library(format!(
                "{} exited with {}: {}",
                self.osascript,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn set_property(&self, id: &TrackId, property: &str, value: u8) -> Result<()> {
        log::debug!("Setting {property} of {id} to {value}");
        self.run_script(&set_property_script(id, property, value)?)
            .await
            .map(|_| ())
    }
}

fn set_property_script(id: &TrackId, property: &str, value: u8) -> Result<String> {
    let id = serde_json::to_string(&id.0).map_err(|e| SyncError::Library(e.to_string()))?;
    Ok(format!(
        r#"const matches = Application("Music").libraryPlaylists[0].tracks.whose({{persistentID: {id}}});
if (matches.length === 0) {{ throw new Error("No track with persistent ID " + {id}); }}
matches[0].{property} = {value};"#
    ))
}

/// Parse the output of the list script.
fn parse_tracks(json: &str) -> Result<Vec<LocalTrack>> {
    let tracks: Vec<ScriptTrack> = serde_json::from_str(json.trim())
        .map_err(|e| SyncError::Library(format!("Unexpected track listing: {e}")))?;
    Ok(tracks.into_iter().map(LocalTrack::from).collect())
}

#[async_trait(?Send)]
impl MusicLibrary for MusicAppLibrary {
    async fn list_tracks(&self) -> Result<Vec<LocalTrack>> {
        let output = self.run_script(LIST_TRACKS_SCRIPT).await?;
        let tracks = parse_tracks(&output)?;
        log::debug!("Music library holds {} tracks", tracks.len());
        Ok(tracks)
    }

    async fn set_album_rating(&self, id: &TrackId, value: u8) -> Result<()> {
        self.set_property(id, "albumRating", value).await
    }

    async fn set_track_rating(&self, id: &TrackId, value: u8) -> Result<()> {
        self.set_property(id, "rating", value).await
    }
}
