//! Player profile persistence with file locking.
//!
//! Only the player's name and lifetime counters are stored between runs;
//! game sessions themselves are never persisted.

use crate::{Difficulty, Error, Outcome, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Lifetime stats for the local player
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PlayerProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub games_played: u32,
    #[serde(default)]
    pub wins: u32,
    #[serde(default)]
    pub losses: u32,
    #[serde(default)]
    pub best_time_secs: Option<u32>,
    #[serde(default)]
    pub last_difficulty: Option<Difficulty>,
    #[serde(default)]
    pub last_played: Option<DateTime<Utc>>,
}

impl PlayerProfile {
    /// Fold one finished case into the counters
    pub fn record_result(&mut self, outcome: Outcome, time_secs: u32, difficulty: Difficulty) {
        self.games_played += 1;
        match outcome {
            Outcome::Win => {
                self.wins += 1;
                self.best_time_secs = Some(
                    self.best_time_secs
                        .map_or(time_secs, |best| best.min(time_secs)),
                );
            }
            Outcome::Lose => self.losses += 1,
        }
        self.last_difficulty = Some(difficulty);
        self.last_played = Some(Utc::now());
    }

    /// Load the profile from a file with shared locking
    ///
    /// Returns a default profile if the file doesn't exist.
    /// If the file is corrupted, logs a warning and returns a default profile.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No profile found, starting fresh");
            return Ok(Self::default());
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!("Unable to open profile {:?}: {}. Using defaults.", path, e);
                return Ok(Self::default());
            }
        };

        if let Err(e) = file.lock_shared() {
            tracing::warn!("Unable to lock profile {:?}: {}. Using defaults.", path, e);
            return Ok(Self::default());
        }

        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(&file);
        if let Err(e) = reader.read_to_string(&mut contents) {
            let _ = file.unlock();
            tracing::warn!("Failed to read profile {:?}: {}. Using defaults.", path, e);
            return Ok(Self::default());
        }

        file.unlock()?;

        match serde_json::from_str::<PlayerProfile>(&contents) {
            Ok(profile) => {
                tracing::debug!("Loaded player profile from {:?}", path);
                Ok(profile)
            }
            Err(e) => {
                tracing::warn!("Failed to parse profile {:?}: {}. Using defaults.", path, e);
                Ok(Self::default())
            }
        }
    }

    /// Save the profile atomically
    ///
    /// Writes to a temp file in the same directory, syncs it, then renames it
    /// over the existing file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "profile path missing parent")
        })?;
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string_pretty(self)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved player profile to {:?}", path);
        Ok(())
    }

    /// Load the profile, modify it, and save it back
    pub fn update<F>(path: &Path, f: F) -> Result<Self>
    where
        F: FnOnce(&mut PlayerProfile) -> Result<()>,
    {
        let mut profile = Self::load(path)?;
        f(&mut profile)?;
        profile.save(path)?;
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("profile.json");

        let mut profile = PlayerProfile {
            name: Some("Grey".into()),
            ..PlayerProfile::default()
        };
        profile.record_result(Outcome::Win, 80, Difficulty::Hard);
        profile.save(&path).unwrap();

        let loaded = PlayerProfile::load(&path).unwrap();
        assert_eq!(loaded, profile);
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let temp_dir = tempfile::tempdir().unwrap();
        let profile = PlayerProfile::load(&temp_dir.path().join("missing.json")).unwrap();
        assert_eq!(profile, PlayerProfile::default());
    }

    #[test]
    fn test_record_result_counters() {
        let mut profile = PlayerProfile::default();
        profile.record_result(Outcome::Win, 120, Difficulty::Medium);
        profile.record_result(Outcome::Lose, 300, Difficulty::Medium);
        profile.record_result(Outcome::Win, 90, Difficulty::Easy);

        assert_eq!(profile.games_played, 3);
        assert_eq!(profile.wins, 2);
        assert_eq!(profile.losses, 1);
        assert_eq!(profile.best_time_secs, Some(90));
        assert_eq!(profile.last_difficulty, Some(Difficulty::Easy));
        assert!(profile.last_played.is_some());
    }

    #[test]
    fn test_update_pattern() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("profile.json");

        PlayerProfile::update(&path, |p| {
            p.name = Some("Shepherd".into());
            Ok(())
        })
        .unwrap();

        let loaded = PlayerProfile::load(&path).unwrap();
        assert_eq!(loaded.name.as_deref(), Some("Shepherd"));
    }

    #[test]
    fn test_corrupted_profile_returns_default() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("profile.json");
        std::fs::write(&path, "{ invalid json }").unwrap();

        let profile = PlayerProfile::load(&path).unwrap();
        assert_eq!(profile, PlayerProfile::default());
    }

    #[test]
    fn test_atomic_save_leaves_no_temp_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("profile.json");
        PlayerProfile::default().save(&path).unwrap();

        let extras: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != "profile.json")
            .collect();
        assert!(extras.is_empty(), "unexpected files: {:?}", extras);
    }
}
