use crate::types::RatingSnapshot;
use crate::{Result, SyncError};
use std::fs;
use std::path::{Path, PathBuf};

/// File name used when no platform data directory is available
const FALLBACK_FILE: &str = "discogs2music.json";

/// The JSON document ratings are cached in between runs.
///
/// The document looks like
/// `{ "last_updated": <unix seconds>, "ratings": { artist: { album: { "rating": n, ... } } } }`.
/// A missing or unreadable file is treated as "no prior data"; saving goes
/// through a temporary file so a failed write never truncates a good cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFile {
    path: PathBuf,
}

impl DataFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Data file in the platform data directory.
    ///
    /// Returns a path like `~/.local/share/discogs2music/ratings.json`, or
    /// `./discogs2music.json` when the data directory cannot be determined.
    pub fn default_path() -> PathBuf {
        match dirs::data_dir() {
            Some(data_dir) => data_dir.join("discogs2music").join("ratings.json"),
            None => PathBuf::from(FALLBACK_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read and parse the data file.
    pub fn read(&self) -> Result<RatingSnapshot> {
        let contents = fs::read_to_string(&self.path).map_err(|e| {
            SyncError::Persistence(format!("Failed to read {}: {e}", self.path.display()))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            SyncError::Persistence(format!("Failed to parse {}: {e}", self.path.display()))
        })
    }

    /// Load the cached snapshot, or `None` if there is nothing usable.
    pub fn load(&self) -> Option<RatingSnapshot> {
        if !self.exists() {
            log::debug!("No data file at {}", self.path.display());
            return None;
        }

        match self.read() {
            Ok(snapshot) => {
                log::debug!(
                    "Loaded {} ratings from {}",
                    snapshot.ratings.len(),
                    self.path.display()
                );
                Some(snapshot)
            }
            Err(e) => {
                log::warn!("Ignoring data file: {e}");
                None
            }
        }
    }

    /// Write `snapshot`, replacing the file atomically.
    pub fn save(&self, snapshot: &RatingSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                SyncError::Persistence(format!(
                    "Failed to create directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| SyncError::Persistence(format!("Failed to serialize ratings: {e}")))?;

        let temp_path = self.temp_path();
        fs::write(&temp_path, json).map_err(|e| {
            SyncError::Persistence(format!("Failed to write {}: {e}", temp_path.display()))
        })?;
        fs::rename(&temp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            SyncError::Persistence(format!("Failed to replace {}: {e}", self.path.display()))
        })?;

        log::debug!("Ratings saved to: {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| FALLBACK_FILE.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl Default for DataFile {
    fn default() -> Self {
        Self::new(Self::default_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::NormalizedKey;
    use crate::types::{RatingRecord, RatingStore};
    use chrono::{TimeZone, Utc};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "discogs2music-persistence-{name}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_save_and_load() {
        let dir = scratch_dir("save");
        let file = DataFile::new(dir.join("nested").join("ratings.json"));

        let mut ratings = RatingStore::new();
        ratings.insert_if_absent(
            NormalizedKey::new("Nirvana"),
            NormalizedKey::new("Nevermind"),
            RatingRecord::new(5).with_ids(367084, 1001),
        );
        let snapshot = RatingSnapshot {
            last_updated: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            ratings,
        };

        tokio_test::assert_ok!(file.save(&snapshot));
        assert!(file.exists());
        assert!(!file.temp_path().exists());

        let loaded = file.load().unwrap();
        assert_eq!(loaded, snapshot);

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(file.path()).unwrap()).unwrap();
        assert_eq!(raw["last_updated"], 1_700_000_000);
        assert_eq!(raw["ratings"]["nirvana"]["nevermind"]["rating"], 5);
        assert_eq!(raw["ratings"]["nirvana"]["nevermind"]["id"], 367084);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_file_loads_nothing() {
        let dir = scratch_dir("missing");
        let file = DataFile::new(dir.join("ratings.json"));
        assert!(file.load().is_none());
    }

    #[test]
    fn test_malformed_file_loads_nothing() {
        let dir = scratch_dir("malformed");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ratings.json");
        fs::write(&path, "{ not json").unwrap();

        let file = DataFile::new(&path);
        assert!(file.load().is_none());
        tokio_test::assert_err!(file.read());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_legacy_keys_are_renormalized() {
        let dir = scratch_dir("legacy");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ratings.json");
        fs::write(
            &path,
            r#"{
                "last_updated": 1600000000,
                "ratings": {
                    "Sigur Rós": { "Ágætis byrjun": { "rating": 5 } },
                    "Nirvana": { "Nevermind": { "rating": 9 } }
                }
            }"#,
        )
        .unwrap();

        let snapshot = DataFile::new(&path).load().unwrap();
        assert_eq!(
            snapshot
                .ratings
                .get(&NormalizedKey::new("sigur ros"), &NormalizedKey::new("agætis byrjun"))
                .map(|record| record.rating),
            Some(5)
        );
        assert_eq!(snapshot.ratings.len(), 1);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_default_path_ends_with_file_name() {
        let path = DataFile::default_path();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name == "ratings.json" || name == FALLBACK_FILE);
    }
}
